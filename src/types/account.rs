use serde::{Deserialize, Serialize};

use crate::errors::ChainResult;
use crate::serialize::{CanonicalDecode, CanonicalEncode, Reader, Tag, put_i64, put_tag};

/// Ledger view of one address, maintained by the address service and carried
/// in snapshot info for recovery. Balances are base units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressCacheData {
    pub balance: i64,
}

impl AddressCacheData {
    pub fn new(balance: i64) -> Self {
        Self { balance }
    }
}

impl CanonicalEncode for AddressCacheData {
    fn encode(&self, out: &mut Vec<u8>) {
        put_tag(out, Tag::AddressCacheData);
        put_i64(out, self.balance);
    }
}

impl CanonicalDecode for AddressCacheData {
    fn decode(reader: &mut Reader<'_>) -> ChainResult<Self> {
        reader.expect_tag(Tag::AddressCacheData)?;
        Ok(Self {
            balance: reader.i64()?,
        })
    }
}
