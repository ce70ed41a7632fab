//! Value types shared by the ledger records and the settlement operations
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;

use crate::error::ShopError;
use crate::utils::new_record_id;

pub const MIN_QUANTITY: u32 = 1;
pub const MAX_QUANTITY: u32 = 1000;

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident, $hrp:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(String);

        impl $name {
            pub(crate) const HRP: &'static str = $hrp;

            /// Mint a fresh, time-ordered id.
            pub fn generate() -> Result<Self, ShopError> {
                new_record_id(Self::HRP).map(Self)
            }
            pub fn as_str(&self) -> &str {
                &self.0
            }
            pub(crate) fn key(&self) -> &[u8] {
                self.0.as_bytes()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl<C> minicbor::Encode<C> for $name {
            fn encode<W: minicbor::encode::Write>(
                &self,
                e: &mut minicbor::Encoder<W>,
                _: &mut C,
            ) -> Result<(), minicbor::encode::Error<W::Error>> {
                e.str(&self.0)?.ok()
            }
        }

        impl<'b, C> minicbor::Decode<'b, C> for $name {
            fn decode(
                d: &mut minicbor::Decoder<'b>,
                _: &mut C,
            ) -> Result<Self, minicbor::decode::Error> {
                Ok(Self(d.str()?.to_owned()))
            }
        }
    };
}

record_id!(
    /// bech32m id of a customer, `cust1...`
    CustomerId,
    "cust"
);
record_id!(
    /// bech32m id of a product, `prod1...`
    ProductId,
    "prod"
);
record_id!(
    /// bech32m id of a purchase (an invoice line), `purchase1...`
    PurchaseId,
    "purchase"
);
record_id!(
    /// bech32m id of a refund request, `refund1...`
    RefundRequestId,
    "refund"
);

/// Number of units bought in one purchase. Always within `1..=1000`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Quantity(u32);

impl Quantity {
    pub fn new(units: u32) -> Result<Self, ShopError> {
        if (MIN_QUANTITY..=MAX_QUANTITY).contains(&units) {
            Ok(Self(units))
        } else {
            Err(ShopError::InvalidQuantity(units))
        }
    }
    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<C> minicbor::Encode<C> for Quantity {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.u32(self.0)?.ok()
    }
}

impl<'b, C> minicbor::Decode<'b, C> for Quantity {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        Quantity::new(d.u32()?)
            .map_err(|_| minicbor::decode::Error::message("stored quantity is out of range"))
    }
}

/// Currency amount with exactly two decimal places.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);
    const SCALE: u32 = 2;

    pub fn from_cents(cents: i64) -> Self {
        Money(Decimal::new(cents, Self::SCALE))
    }

    /// Accepts any decimal that fits in two fractional digits.
    pub fn from_decimal(value: Decimal) -> Result<Self, ShopError> {
        if value.normalize().scale() > Self::SCALE {
            return Err(ShopError::InvalidAmount(format!(
                "{value} has more than {} decimal places",
                Self::SCALE
            )));
        }
        let mut value = value;
        value.rescale(Self::SCALE);
        Ok(Money(value))
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }
    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }
    pub fn is_positive(&self) -> bool {
        self.0.is_sign_positive() && !self.0.is_zero()
    }

    pub fn checked_add(self, rhs: Money) -> Option<Money> {
        self.0.checked_add(rhs.0).map(Money)
    }
    pub fn checked_sub(self, rhs: Money) -> Option<Money> {
        self.0.checked_sub(rhs.0).map(Money)
    }
    /// Line total for `quantity` units at this unit price.
    pub fn checked_mul_qty(self, quantity: Quantity) -> Option<Money> {
        self.0.checked_mul(Decimal::from(quantity.get())).map(Money)
    }
}

impl FromStr for Money {
    type Err = ShopError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value =
            Decimal::from_str(s.trim()).map_err(|e| ShopError::InvalidAmount(format!("{s:?}: {e}")))?;
        Money::from_decimal(value)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// stored as the 16 byte `Decimal::serialize` form so no precision is lost
impl<C> minicbor::Encode<C> for Money {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.bytes(&self.0.serialize())?.ok()
    }
}

impl<'b, C> minicbor::Decode<'b, C> for Money {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let raw: [u8; 16] = d
            .bytes()?
            .try_into()
            .map_err(|_| minicbor::decode::Error::message("money must be 16 bytes"))?;

        Ok(Money(Decimal::deserialize(raw)))
    }
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
pub struct TimeStamp(DateTime<Utc>);

impl TimeStamp {
    pub fn new() -> Self {
        Self(Utc::now())
    }
    pub fn new_with(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> Option<Self> {
        Utc.with_ymd_and_hms(year, month, day, hour, min, sec)
            .single()
            .map(Self)
    }
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        self.0
    }
    /// Calendar-correct shift; `None` only when the result leaves chrono's range.
    pub fn checked_add(&self, duration: Duration) -> Option<Self> {
        self.0.checked_add_signed(duration).map(Self)
    }
}

impl Default for TimeStamp {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TimeStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

impl From<DateTime<Utc>> for TimeStamp {
    fn from(value: DateTime<Utc>) -> Self {
        TimeStamp(value)
    }
}

impl<C> minicbor::Encode<C> for TimeStamp {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        if let Some(nsec) = self.0.timestamp_nanos_opt() {
            return e.i64(nsec)?.ok();
        }

        Err(minicbor::encode::Error::message(
            "failed to encode timestamp. timestamp_nanos_opt returned None",
        ))
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let nsecs = d.i64()?;

        Ok(TimeStamp(DateTime::from_timestamp_nanos(nsecs)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_encoding() {
        let original = TimeStamp::new();

        let encoding = minicbor::to_vec(original).unwrap();
        let decode: TimeStamp = minicbor::decode(&encoding).unwrap();

        assert_eq!(original, decode);
    }

    #[test]
    fn money_encoding_keeps_scale() {
        let original: Money = "30.50".parse().unwrap();

        let encoding = minicbor::to_vec(original).unwrap();
        let decode: Money = minicbor::decode(&encoding).unwrap();

        assert_eq!(original, decode);
        assert_eq!(decode.to_string(), "30.50");
    }

    #[test]
    fn money_rescales_to_two_places() {
        assert_eq!("30".parse::<Money>().unwrap().to_string(), "30.00");
        assert_eq!("0.5".parse::<Money>().unwrap(), Money::from_cents(50));
        assert_eq!(Money::from_cents(1_000).to_string(), "10.00");
    }

    #[test]
    fn money_rejects_sub_cent_precision() {
        assert!(matches!(
            "1.005".parse::<Money>(),
            Err(ShopError::InvalidAmount(_))
        ));
        // trailing zeros are not real precision
        assert!("1.500".parse::<Money>().is_ok());
        assert!("abc".parse::<Money>().is_err());
    }

    #[test]
    fn money_sign_checks() {
        assert!(Money::from_cents(1).is_positive());
        assert!(Money::from_cents(-1).is_negative());
        assert!(!Money::ZERO.is_positive());
        assert!(!Money::ZERO.is_negative());
    }

    #[test]
    fn line_total_multiplies_by_quantity() {
        let price = Money::from_cents(3_000);
        let qty = Quantity::new(3).unwrap();

        assert_eq!(price.checked_mul_qty(qty), Some(Money::from_cents(9_000)));
        assert_eq!(
            Money::from_cents(10_000).checked_sub(Money::from_cents(9_000)),
            Some(Money::from_cents(1_000))
        );
    }

    #[test]
    fn quantity_bounds() {
        assert!(Quantity::new(0).is_err());
        assert!(Quantity::new(1).is_ok());
        assert!(Quantity::new(1000).is_ok());
        assert!(matches!(
            Quantity::new(1001),
            Err(ShopError::InvalidQuantity(1001))
        ));
    }

    #[test]
    fn quantity_decode_rejects_out_of_range() {
        let encoding = minicbor::to_vec(0u32).unwrap();
        assert!(minicbor::decode::<Quantity>(&encoding).is_err());
    }

    #[test]
    fn ids_carry_their_prefix() {
        let customer = CustomerId::generate().unwrap();
        let product = ProductId::generate().unwrap();

        assert!(customer.as_str().starts_with("cust1"));
        assert!(product.as_str().starts_with("prod1"));
        assert_ne!(customer, CustomerId::generate().unwrap());
    }
}
