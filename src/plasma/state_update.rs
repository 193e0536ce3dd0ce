use crate::codec::{decode, encode, Codable, CodecError, Coder, Encodable, Kind};
use crate::crypto::Hasher;
use crate::ovm::{OwnershipDecider, Property};
use crate::types::{Address, Range, H256, U256};

/// Claim that `range` of a deposit contract's coins is governed by
/// `state_object` as of `block_number`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateUpdate {
    pub decider_address: Address,
    pub deposit_contract_address: Address,
    pub range: Range,
    pub block_number: U256,
    pub state_object: Property,
}

impl StateUpdate {
    pub fn new(
        decider_address: Address,
        deposit_contract_address: Address,
        range: Range,
        block_number: U256,
        state_object: Property,
    ) -> Self {
        Self { decider_address, deposit_contract_address, range, block_number, state_object }
    }

    /// The same claim restricted to `range`
    pub fn with_range(&self, range: Range) -> Self {
        Self { range, ..self.clone() }
    }

    /// The same claim as of another block
    pub fn with_block_number(&self, block_number: U256) -> Self {
        Self { block_number, ..self.clone() }
    }

    /// The claim as an OVM property
    pub fn property(&self, coder: &dyn Coder) -> Property {
        Property::new(
            self.decider_address,
            vec![
                encode(coder, &self.deposit_contract_address),
                encode(coder, &self.range),
                encode(coder, &self.block_number),
                encode(coder, &self.state_object),
            ],
        )
    }

    pub fn from_property(property: &Property, coder: &dyn Coder) -> Result<Self, CodecError> {
        match property.inputs.as_slice() {
            [deposit_contract, range, block_number, state_object] => Ok(Self {
                decider_address: property.decider_address,
                deposit_contract_address: decode(coder, deposit_contract)?,
                range: decode(coder, range)?,
                block_number: decode(coder, block_number)?,
                state_object: decode(coder, state_object)?,
            }),
            inputs => Err(CodecError::InvalidValue(format!(
                "state update property has {} inputs, expected 4",
                inputs.len()
            ))),
        }
    }

    /// Leaf committed to the block tree for this claim
    pub fn leaf_hash(&self, coder: &dyn Coder, hasher: &dyn Hasher) -> H256 {
        hasher.hash(&encode(coder, &self.property(coder)))
    }

    /// Owner of the range when the state object is an ownership claim
    pub fn owner(&self, ownership_predicate: &Address, coder: &dyn Coder) -> Option<Address> {
        OwnershipDecider::owner_of(&self.state_object, ownership_predicate, coder)
    }
}

impl Encodable for StateUpdate {
    fn kind() -> Kind {
        Kind::structure(&[
            ("deciderAddress", Kind::Address),
            ("depositContractAddress", Kind::Address),
            ("range", Range::kind()),
            ("blockNumber", Kind::BigNumber),
            ("stateObject", Property::kind()),
        ])
    }

    fn to_codable(&self) -> Codable {
        Codable::structure(vec![
            ("deciderAddress", Codable::Address(self.decider_address)),
            ("depositContractAddress", Codable::Address(self.deposit_contract_address)),
            ("range", self.range.to_codable()),
            ("blockNumber", Codable::BigNumber(self.block_number)),
            ("stateObject", self.state_object.to_codable()),
        ])
    }

    fn from_codable(value: Codable) -> Result<Self, CodecError> {
        let mut fields = value.into_fields(5)?;
        Ok(Self {
            decider_address: fields.next_address()?,
            deposit_contract_address: fields.next_address()?,
            range: fields.next_decoded()?,
            block_number: fields.next_big_number()?,
            state_object: fields.next_decoded()?,
        })
    }
}
