use crate::codec::{Codable, CodecError, Encodable, Kind};
use crate::types::{Address, Range, H256, U256};

/// Whether the aggregator accepted a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptStatus {
    False = 0,
    True = 1,
}

impl ReceiptStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, ReceiptStatus::True)
    }
}

impl From<bool> for ReceiptStatus {
    fn from(value: bool) -> Self {
        if value {
            ReceiptStatus::True
        } else {
            ReceiptStatus::False
        }
    }
}

/// Answer to a submitted transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionReceipt {
    pub status: ReceiptStatus,
    /// Block the resulting state update is queued for
    pub block_number: U256,
    /// Blocks of the state updates the transaction spent
    pub prev_block_numbers: Vec<U256>,
    pub range: Range,
    pub deposit_contract_address: Address,
    pub from: Address,
    pub transaction_hash: H256,
}

impl Encodable for TransactionReceipt {
    fn kind() -> Kind {
        Kind::structure(&[
            ("status", Kind::Integer),
            ("blockNumber", Kind::BigNumber),
            ("prevBlockNumbers", Kind::list(Kind::BigNumber)),
            ("range", Range::kind()),
            ("depositContractAddress", Kind::Address),
            ("from", Kind::Address),
            ("transactionHash", Kind::FixedBytes(32)),
        ])
    }

    fn to_codable(&self) -> Codable {
        Codable::structure(vec![
            ("status", Codable::Integer(self.status as i64)),
            ("blockNumber", Codable::BigNumber(self.block_number)),
            ("prevBlockNumbers", Codable::List(self.prev_block_numbers.iter().copied().map(Codable::BigNumber).collect())),
            ("range", self.range.to_codable()),
            ("depositContractAddress", Codable::Address(self.deposit_contract_address)),
            ("from", Codable::Address(self.from)),
            ("transactionHash", Codable::hash(&self.transaction_hash)),
        ])
    }

    fn from_codable(value: Codable) -> Result<Self, CodecError> {
        let mut fields = value.into_fields(7)?;
        let status = match fields.next_integer()? {
            0 => ReceiptStatus::False,
            1 => ReceiptStatus::True,
            other => return Err(CodecError::InvalidValue(format!("receipt status {}", other))),
        };
        Ok(Self {
            status,
            block_number: fields.next_big_number()?,
            prev_block_numbers: fields
                .next_list()?
                .into_iter()
                .map(Codable::into_big_number)
                .collect::<Result<_, _>>()?,
            range: fields.next_decoded()?,
            deposit_contract_address: fields.next_address()?,
            from: fields.next_address()?,
            transaction_hash: fields.next_h256()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode, encode, JsonCoder};

    #[test]
    fn test_codec_round_trip() {
        let receipt = TransactionReceipt {
            status: ReceiptStatus::True,
            block_number: U256::from(2),
            prev_block_numbers: vec![U256::from(0), U256::from(1)],
            range: Range::from_u64(0, 15).unwrap(),
            deposit_contract_address: Address::from_low_u64_be(100),
            from: Address::from_low_u64_be(7),
            transaction_hash: H256::repeat_byte(0x11),
        };
        let bytes = encode(&JsonCoder, &receipt);
        assert_eq!(decode::<TransactionReceipt>(&JsonCoder, &bytes).unwrap(), receipt);
    }

    #[test]
    fn test_status_from_bool() {
        assert!(ReceiptStatus::from(true).is_success());
        assert_eq!(ReceiptStatus::from(false), ReceiptStatus::False);
    }
}
