use crate::codec::{encode, Codable, CodecError, Coder, Encodable, Kind};
use crate::crypto::Hasher;
use crate::types::H256;

use super::state_update::StateUpdate;

/// A state update recorded as a safe point to exit from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    pub state_update: StateUpdate,
}

impl Checkpoint {
    pub fn new(state_update: StateUpdate) -> Self {
        Self { state_update }
    }

    /// Identifier derived from the state update property
    pub fn id(&self, coder: &dyn Coder, hasher: &dyn Hasher) -> H256 {
        hasher.hash(&encode(coder, &self.state_update.property(coder)))
    }
}

impl Encodable for Checkpoint {
    fn kind() -> Kind {
        Kind::structure(&[("stateUpdate", StateUpdate::kind())])
    }

    fn to_codable(&self) -> Codable {
        Codable::structure(vec![("stateUpdate", self.state_update.to_codable())])
    }

    fn from_codable(value: Codable) -> Result<Self, CodecError> {
        let mut fields = value.into_fields(1)?;
        Ok(Self { state_update: fields.next_decoded()? })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode, JsonCoder};
    use crate::crypto::Keccak256Hasher;
    use crate::ovm::Property;
    use crate::types::{Address, Range, U256};

    #[test]
    fn test_id_matches_leaf_hash() {
        let su = StateUpdate::new(
            Address::from_low_u64_be(3),
            Address::from_low_u64_be(100),
            Range::from_u64(0, 10).unwrap(),
            U256::zero(),
            Property::new(Address::from_low_u64_be(1), vec![]),
        );
        let checkpoint = Checkpoint::new(su.clone());
        assert_eq!(checkpoint.id(&JsonCoder, &Keccak256Hasher), su.leaf_hash(&JsonCoder, &Keccak256Hasher));

        let bytes = encode(&JsonCoder, &checkpoint);
        assert_eq!(decode::<Checkpoint>(&JsonCoder, &bytes).unwrap(), checkpoint);
    }
}
