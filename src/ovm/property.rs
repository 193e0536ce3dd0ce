use std::fmt;

use crate::codec::{Codable, CodecError, Encodable, Kind};
use crate::types::Address;

/// A predicate invocation: the decider to ask and the encoded inputs to ask with
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Property {
    pub decider_address: Address,
    pub inputs: Vec<Vec<u8>>,
}

impl Property {
    pub fn new(decider_address: Address, inputs: Vec<Vec<u8>>) -> Self {
        Self { decider_address, inputs }
    }

    /// The same property with `input` appended
    pub fn with_input(&self, input: Vec<u8>) -> Self {
        let mut inputs = self.inputs.clone();
        inputs.push(input);
        Self { decider_address: self.decider_address, inputs }
    }
}

impl fmt::Debug for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inputs: Vec<String> = self.inputs.iter().map(|input| format!("0x{}", hex::encode(input))).collect();
        write!(f, "Property({:?}, [{}])", self.decider_address, inputs.join(", "))
    }
}

impl Encodable for Property {
    fn kind() -> Kind {
        Kind::structure(&[("deciderAddress", Kind::Address), ("inputs", Kind::list(Kind::Bytes))])
    }

    fn to_codable(&self) -> Codable {
        Codable::structure(vec![
            ("deciderAddress", Codable::Address(self.decider_address)),
            ("inputs", Codable::List(self.inputs.iter().cloned().map(Codable::Bytes).collect())),
        ])
    }

    fn from_codable(value: Codable) -> Result<Self, CodecError> {
        let mut fields = value.into_fields(2)?;
        let decider_address = fields.next_address()?;
        let inputs = fields.next_list()?.into_iter().map(Codable::into_bytes).collect::<Result<_, _>>()?;
        Ok(Self { decider_address, inputs })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode, encode, JsonCoder};

    #[test]
    fn test_with_input_leaves_original_untouched() {
        let property = Property::new(Address::from_low_u64_be(1), vec![vec![1]]);
        let extended = property.with_input(vec![2, 3]);
        assert_eq!(property.inputs.len(), 1);
        assert_eq!(extended.inputs, vec![vec![1], vec![2, 3]]);
        assert_eq!(extended.decider_address, property.decider_address);
    }

    #[test]
    fn test_json_layout() {
        let property = Property::new(Address::from_low_u64_be(1), vec![vec![0xab], vec![]]);
        let bytes = encode(&JsonCoder, &property);
        assert_eq!(
            String::from_utf8(bytes.clone()).unwrap(),
            "[\"0x0000000000000000000000000000000000000001\",[\"0xab\",\"0x\"]]"
        );
        assert_eq!(decode::<Property>(&JsonCoder, &bytes).unwrap(), property);
    }
}
