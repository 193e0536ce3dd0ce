use crate::codec::{encode, Codable, CodecError, Coder, Encodable, Kind};
use crate::crypto::{Hasher, SignatureError, Signer};
use crate::ovm::Property;
use crate::types::{Address, Range, H256, U256};

/// Request to move `range` of a deposit contract's coins under `state_object`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub deposit_contract_address: Address,
    pub range: Range,
    /// Last block the transaction may be included in
    pub max_block_number: U256,
    pub state_object: Property,
    pub from: Address,
}

impl Transaction {
    pub fn new(
        deposit_contract_address: Address,
        range: Range,
        max_block_number: U256,
        state_object: Property,
        from: Address,
    ) -> Self {
        Self { deposit_contract_address, range, max_block_number, state_object, from }
    }

    /// Hash of the coder encoding; this is the message owners sign over
    pub fn hash(&self, coder: &dyn Coder, hasher: &dyn Hasher) -> H256 {
        hasher.hash(&encode(coder, self))
    }

    pub fn sign(self, signer: &dyn Signer, coder: &dyn Coder) -> Result<SignedTransaction, SignatureError> {
        let signature = signer.sign(&encode(coder, &self))?;
        Ok(SignedTransaction { transaction: self, signature })
    }
}

impl Encodable for Transaction {
    fn kind() -> Kind {
        Kind::structure(&[
            ("depositContractAddress", Kind::Address),
            ("range", Range::kind()),
            ("maxBlockNumber", Kind::BigNumber),
            ("stateObject", Property::kind()),
            ("from", Kind::Address),
        ])
    }

    fn to_codable(&self) -> Codable {
        Codable::structure(vec![
            ("depositContractAddress", Codable::Address(self.deposit_contract_address)),
            ("range", self.range.to_codable()),
            ("maxBlockNumber", Codable::BigNumber(self.max_block_number)),
            ("stateObject", self.state_object.to_codable()),
            ("from", Codable::Address(self.from)),
        ])
    }

    fn from_codable(value: Codable) -> Result<Self, CodecError> {
        let mut fields = value.into_fields(5)?;
        Ok(Self {
            deposit_contract_address: fields.next_address()?,
            range: fields.next_decoded()?,
            max_block_number: fields.next_big_number()?,
            state_object: fields.next_decoded()?,
            from: fields.next_address()?,
        })
    }
}

/// A transaction together with its sender's signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub transaction: Transaction,
    pub signature: Vec<u8>,
}

impl SignedTransaction {
    pub fn new(transaction: Transaction, signature: Vec<u8>) -> Self {
        Self { transaction, signature }
    }

    /// Hash of the unsigned transaction
    pub fn hash(&self, coder: &dyn Coder, hasher: &dyn Hasher) -> H256 {
        self.transaction.hash(coder, hasher)
    }
}

impl Encodable for SignedTransaction {
    fn kind() -> Kind {
        Kind::structure(&[("transaction", Transaction::kind()), ("signature", Kind::Bytes)])
    }

    fn to_codable(&self) -> Codable {
        Codable::structure(vec![
            ("transaction", self.transaction.to_codable()),
            ("signature", Codable::Bytes(self.signature.clone())),
        ])
    }

    fn from_codable(value: Codable) -> Result<Self, CodecError> {
        let mut fields = value.into_fields(2)?;
        Ok(Self { transaction: fields.next_decoded()?, signature: fields.next_bytes()? })
    }
}
