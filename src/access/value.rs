use anyhow::{Result, bail};

/// Data types supported by the database
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Boolean = 1,
    Int32 = 2,
    Varchar = 3,
}

impl DataType {
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            1 => Ok(DataType::Boolean),
            2 => Ok(DataType::Int32),
            3 => Ok(DataType::Varchar),
            _ => bail!("Unknown data type: {}", value),
        }
    }
}

/// Values that can be stored in the database
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Int32(i32),
    String(String),
}

impl Value {
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Value::Null => None,
            Value::Boolean(_) => Some(DataType::Boolean),
            Value::Int32(_) => Some(DataType::Int32),
            Value::String(_) => Some(DataType::Varchar),
        }
    }

    /// NULL is compatible with every column type.
    pub fn is_compatible_with(&self, data_type: DataType) -> bool {
        match self.data_type() {
            None => true,
            Some(own) => own == data_type,
        }
    }
}

/// Serialize a row of values into a self-describing byte string: a count,
/// then one type tag per value followed by its payload.
pub fn serialize_values(values: &[Value]) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(&(values.len() as u32).to_le_bytes());

    for value in values {
        match value {
            Value::Null => data.push(0),
            Value::Boolean(b) => {
                data.push(DataType::Boolean as u8);
                data.push(*b as u8);
            }
            Value::Int32(i) => {
                data.push(DataType::Int32 as u8);
                data.extend_from_slice(&i.to_le_bytes());
            }
            Value::String(s) => {
                data.push(DataType::Varchar as u8);
                data.extend_from_slice(&(s.len() as u32).to_le_bytes());
                data.extend_from_slice(s.as_bytes());
            }
        }
    }

    data
}

/// Deserialize a byte string produced by [`serialize_values`].
pub fn deserialize_values(data: &[u8]) -> Result<Vec<Value>> {
    let mut cursor = Cursor { data, offset: 0 };

    let count = cursor.read_u32()? as usize;
    let mut values = Vec::with_capacity(count);

    for _ in 0..count {
        let tag = cursor.read_u8()?;
        let value = match tag {
            0 => Value::Null,
            t if t == DataType::Boolean as u8 => Value::Boolean(cursor.read_u8()? != 0),
            t if t == DataType::Int32 as u8 => {
                Value::Int32(i32::from_le_bytes(cursor.read_array::<4>()?))
            }
            t if t == DataType::Varchar as u8 => {
                let len = cursor.read_u32()? as usize;
                let bytes = cursor.read_bytes(len)?;
                Value::String(String::from_utf8(bytes.to_vec())?)
            }
            _ => bail!("Unknown value type tag: {}", tag),
        };
        values.push(value);
    }

    Ok(values)
}

struct Cursor<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Cursor<'a> {
    fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.offset + len > self.data.len() {
            bail!("Invalid value data: unexpected end");
        }
        let bytes = &self.data[self.offset..self.offset + len];
        self.offset += len;
        Ok(bytes)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        Ok(self.read_bytes(N)?.try_into().unwrap())
    }

    fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.read_array::<4>()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_type_conversion() -> Result<()> {
        assert_eq!(DataType::from_u8(1)?, DataType::Boolean);
        assert_eq!(DataType::from_u8(2)?, DataType::Int32);
        assert_eq!(DataType::from_u8(3)?, DataType::Varchar);
        assert!(DataType::from_u8(99).is_err());
        Ok(())
    }

    #[test]
    fn test_value_compatibility() {
        assert!(Value::Null.is_compatible_with(DataType::Int32));
        assert!(Value::Boolean(true).is_compatible_with(DataType::Boolean));
        assert!(Value::Int32(42).is_compatible_with(DataType::Int32));
        assert!(Value::String("x".into()).is_compatible_with(DataType::Varchar));

        assert!(!Value::Boolean(true).is_compatible_with(DataType::Int32));
        assert!(!Value::Int32(42).is_compatible_with(DataType::Varchar));
    }

    #[test]
    fn test_round_trip() -> Result<()> {
        let values = vec![
            Value::Int32(42),
            Value::String("Hello".to_string()),
            Value::Boolean(true),
            Value::Null,
        ];

        let serialized = serialize_values(&values);
        assert_eq!(deserialize_values(&serialized)?, values);
        Ok(())
    }

    #[test]
    fn test_empty_row() -> Result<()> {
        let values: Vec<Value> = vec![];
        assert_eq!(deserialize_values(&serialize_values(&values))?, values);
        Ok(())
    }

    #[test]
    fn test_truncated_input_rejected() {
        let values = vec![Value::String("long enough".to_string())];
        let mut serialized = serialize_values(&values);
        serialized.truncate(serialized.len() - 3);

        assert!(deserialize_values(&serialized).is_err());
    }
}
