//! Utility functions for record identifiers and CBOR record encoding

use bech32::Bech32m;
use uuid7::uuid7;

use crate::error::ShopError;

// construct a time-ordered uuid then encode using bech32m under the record kind's prefix
pub fn new_record_id(hrp: &str) -> Result<String, ShopError> {
    let hrp = bech32::Hrp::parse(hrp).map_err(|e| ShopError::Internal(e.to_string()))?;
    let encode = bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())
        .map_err(|e| ShopError::Internal(e.to_string()))?;
    Ok(encode)
}

pub(crate) fn encode_record<T: minicbor::Encode<()>>(record: &T) -> Result<Vec<u8>, ShopError> {
    minicbor::to_vec(record).map_err(|e| ShopError::Internal(e.to_string()))
}

pub(crate) fn decode_record<'b, T: minicbor::Decode<'b, ()>>(bytes: &'b [u8]) -> Result<T, ShopError> {
    Ok(minicbor::decode(bytes)?)
}
