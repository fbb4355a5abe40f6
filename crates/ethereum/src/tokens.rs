//! Conversion between JSON values and ABI tokens
//!
//! Arguments arrive as loosely typed JSON: numbers may be JSON numbers, decimal
//! strings or `0x` hex strings, byte values are hex strings, and tuples are
//! positional arrays. Decoded values go the other way with integers rendered as
//! decimal strings, so nothing wider than 53 bits is lost.

use std::str::FromStr;

use contract_class_common::{Error, Result};
use ethers::abi::{Param, ParamType, Token};
use ethers::types::{Address, I256, U256};
use ethers::utils::to_checksum;
use serde_json::Value;

/// Tokenize `args` against the parameter list of a function or constructor
pub fn tokenize_params(params: &[Param], args: &[Value]) -> Result<Vec<Token>> {
    if params.len() != args.len() {
        return Err(Error::encoding(format!(
            "expected {} arguments, got {}",
            params.len(),
            args.len()
        )));
    }

    params
        .iter()
        .zip(args)
        .map(|(param, arg)| {
            tokenize(&param.kind, arg).map_err(|e| match e {
                Error::Encoding(message) if !param.name.is_empty() => {
                    Error::encoding(format!("{}: {}", param.name, message))
                }
                other => other,
            })
        })
        .collect()
}

/// Tokenize a single value as `kind`
pub fn tokenize(kind: &ParamType, value: &Value) -> Result<Token> {
    match kind {
        ParamType::Address => {
            let text = expect_str(value, "address")?;
            Address::from_str(text)
                .map(Token::Address)
                .map_err(|e| Error::encoding(format!("invalid address {}: {}", text, e)))
        }
        ParamType::Bool => match value {
            Value::Bool(flag) => Ok(Token::Bool(*flag)),
            Value::String(text) if text == "true" => Ok(Token::Bool(true)),
            Value::String(text) if text == "false" => Ok(Token::Bool(false)),
            other => Err(Error::encoding(format!("expected a bool, got {}", other))),
        },
        ParamType::String => match value {
            Value::String(text) => Ok(Token::String(text.clone())),
            Value::Number(number) => Ok(Token::String(number.to_string())),
            other => Err(Error::encoding(format!("expected a string, got {}", other))),
        },
        ParamType::Bytes => parse_hex(value).map(Token::Bytes),
        ParamType::FixedBytes(size) => {
            let mut bytes = parse_hex(value)?;
            if bytes.len() > *size {
                return Err(Error::encoding(format!(
                    "{} bytes do not fit in bytes{}",
                    bytes.len(),
                    size
                )));
            }
            bytes.resize(*size, 0);
            Ok(Token::FixedBytes(bytes))
        }
        ParamType::Uint(bits) => parse_uint(value)
            .and_then(|uint| check_uint_width(uint, *bits))
            .map(Token::Uint),
        ParamType::Int(bits) => parse_int(value)
            .and_then(|int| check_int_width(int, *bits))
            .map(|int| Token::Int(int.into_raw())),
        ParamType::Array(inner) => {
            let items = expect_array(value)?;
            items
                .iter()
                .map(|item| tokenize(inner, item))
                .collect::<Result<Vec<_>>>()
                .map(Token::Array)
        }
        ParamType::FixedArray(inner, size) => {
            let items = expect_array(value)?;
            if items.len() != *size {
                return Err(Error::encoding(format!(
                    "expected {} elements, got {}",
                    size,
                    items.len()
                )));
            }
            items
                .iter()
                .map(|item| tokenize(inner, item))
                .collect::<Result<Vec<_>>>()
                .map(Token::FixedArray)
        }
        ParamType::Tuple(kinds) => {
            let items = expect_array(value)?;
            if items.len() != kinds.len() {
                return Err(Error::encoding(format!(
                    "expected a tuple of {}, got {} elements",
                    kinds.len(),
                    items.len()
                )));
            }
            kinds
                .iter()
                .zip(items)
                .map(|(kind, item)| tokenize(kind, item))
                .collect::<Result<Vec<_>>>()
                .map(Token::Tuple)
        }
    }
}

/// JSON rendering of a decoded token
pub fn token_to_json(token: &Token) -> Value {
    match token {
        Token::Address(address) => Value::String(to_checksum(address, None)),
        Token::FixedBytes(bytes) | Token::Bytes(bytes) => {
            Value::String(format!("0x{}", hex::encode(bytes)))
        }
        Token::Int(raw) => Value::String(I256::from_raw(*raw).to_string()),
        Token::Uint(value) => Value::String(value.to_string()),
        Token::Bool(flag) => Value::Bool(*flag),
        Token::String(text) => Value::String(text.clone()),
        Token::FixedArray(items) | Token::Array(items) | Token::Tuple(items) => {
            Value::Array(items.iter().map(token_to_json).collect())
        }
    }
}

/// JSON rendering of decoded function outputs; a single output is unwrapped
pub fn outputs_to_json(tokens: &[Token]) -> Value {
    match tokens {
        [] => Value::Null,
        [single] => token_to_json(single),
        many => Value::Array(many.iter().map(token_to_json).collect()),
    }
}

fn expect_str<'a>(value: &'a Value, what: &str) -> Result<&'a str> {
    value
        .as_str()
        .ok_or_else(|| Error::encoding(format!("expected {} as a string, got {}", what, value)))
}

fn expect_array(value: &Value) -> Result<&Vec<Value>> {
    value
        .as_array()
        .ok_or_else(|| Error::encoding(format!("expected an array, got {}", value)))
}

fn parse_hex(value: &Value) -> Result<Vec<u8>> {
    let text = expect_str(value, "bytes")?;
    let digits = text.strip_prefix("0x").unwrap_or(text);
    hex::decode(digits).map_err(|e| Error::encoding(format!("invalid hex {}: {}", text, e)))
}

fn parse_uint(value: &Value) -> Result<U256> {
    match value {
        Value::Number(number) => number
            .as_u64()
            .map(U256::from)
            .ok_or_else(|| Error::encoding(format!("{} is not an unsigned integer", number))),
        Value::String(text) => match text.strip_prefix("0x") {
            Some(digits) => U256::from_str_radix(digits, 16)
                .map_err(|e| Error::encoding(format!("invalid integer {}: {}", text, e))),
            None => U256::from_dec_str(text)
                .map_err(|e| Error::encoding(format!("invalid integer {}: {}", text, e))),
        },
        other => Err(Error::encoding(format!("expected an integer, got {}", other))),
    }
}

fn parse_int(value: &Value) -> Result<I256> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .map(I256::from)
            .ok_or_else(|| Error::encoding(format!("{} is not an integer", number))),
        Value::String(text) if text.starts_with("0x") => parse_uint(value).map(I256::from_raw),
        Value::String(text) => I256::from_dec_str(text)
            .map_err(|e| Error::encoding(format!("invalid integer {}: {}", text, e))),
        other => Err(Error::encoding(format!("expected an integer, got {}", other))),
    }
}

fn check_uint_width(uint: U256, bits: usize) -> Result<U256> {
    if bits < 256 && uint.bits() > bits {
        return Err(Error::encoding(format!("{} does not fit in uint{}", uint, bits)));
    }
    Ok(uint)
}

fn check_int_width(int: I256, bits: usize) -> Result<I256> {
    if bits < 256 && bits > 0 {
        let bound = I256::from_raw(U256::one() << (bits - 1));
        if int >= bound || int < -bound {
            return Err(Error::encoding(format!("{} does not fit in int{}", int, bits)));
        }
    }
    Ok(int)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn param(name: &str, kind: ParamType) -> Param {
        Param {
            name: name.to_string(),
            kind,
            internal_type: None,
        }
    }

    #[test]
    fn test_scalars_accept_loose_json() {
        assert_eq!(
            tokenize(&ParamType::Uint(256), &json!(42)).unwrap(),
            Token::Uint(U256::from(42u64))
        );
        assert_eq!(
            tokenize(&ParamType::Uint(256), &json!("0x2a")).unwrap(),
            Token::Uint(U256::from(42u64))
        );
        assert_eq!(
            tokenize(&ParamType::Uint(256), &json!("1000000000000000000000")).unwrap(),
            Token::Uint(U256::exp10(21))
        );
        assert_eq!(
            tokenize(&ParamType::Bool, &json!("true")).unwrap(),
            Token::Bool(true)
        );
        assert_eq!(
            tokenize(&ParamType::Int(256), &json!(-1)).unwrap(),
            Token::Int(U256::MAX)
        );
    }

    #[test]
    fn test_integers_respect_declared_width() {
        assert_eq!(
            tokenize(&ParamType::Uint(8), &json!(255)).unwrap(),
            Token::Uint(U256::from(255u64))
        );
        assert!(matches!(
            tokenize(&ParamType::Uint(8), &json!(300)),
            Err(Error::Encoding(_))
        ));
        assert!(matches!(
            tokenize(&ParamType::Uint(16), &json!("0x10000")),
            Err(Error::Encoding(_))
        ));

        assert_eq!(
            tokenize(&ParamType::Int(8), &json!(-128)).unwrap(),
            Token::Int(I256::from(-128i64).into_raw())
        );
        assert!(tokenize(&ParamType::Int(8), &json!(127)).is_ok());
        assert!(matches!(
            tokenize(&ParamType::Int(8), &json!(128)),
            Err(Error::Encoding(_))
        ));
        assert!(matches!(
            tokenize(&ParamType::Int(8), &json!("-129")),
            Err(Error::Encoding(_))
        ));
    }

    #[test]
    fn test_fixed_bytes_are_right_padded() {
        let token = tokenize(&ParamType::FixedBytes(4), &json!("0xabcd")).unwrap();
        assert_eq!(token, Token::FixedBytes(vec![0xab, 0xcd, 0, 0]));

        assert!(tokenize(&ParamType::FixedBytes(1), &json!("0xabcd")).is_err());
    }

    #[test]
    fn test_nested_arrays_and_tuples() {
        let kind = ParamType::Tuple(vec![
            ParamType::Address,
            ParamType::Array(Box::new(ParamType::Uint(8))),
        ]);
        let value = json!(["0x00000000000000000000000000000000000000aa", [1, "2"]]);

        let token = tokenize(&kind, &value).unwrap();
        assert_eq!(
            token,
            Token::Tuple(vec![
                Token::Address(Address::from_low_u64_be(0xaa)),
                Token::Array(vec![
                    Token::Uint(U256::from(1u64)),
                    Token::Uint(U256::from(2u64))
                ]),
            ])
        );

        let fixed = ParamType::FixedArray(Box::new(ParamType::Bool), 2);
        assert!(matches!(
            tokenize(&fixed, &json!([true])),
            Err(Error::Encoding(_))
        ));
    }

    #[test]
    fn test_argument_count_and_names_in_errors() {
        let params = vec![
            param("to", ParamType::Address),
            param("amount", ParamType::Uint(256)),
        ];

        assert!(matches!(
            tokenize_params(&params, &[json!("0x00000000000000000000000000000000000000aa")]),
            Err(Error::Encoding(message)) if message == "expected 2 arguments, got 1"
        ));
        assert!(matches!(
            tokenize_params(&params, &[json!("nope"), json!(1)]),
            Err(Error::Encoding(message)) if message.starts_with("to: ")
        ));
    }

    #[test]
    fn test_outputs_render_as_json() {
        let address = Address::from_low_u64_be(0xaa);
        assert_eq!(outputs_to_json(&[]), Value::Null);
        assert_eq!(
            outputs_to_json(&[Token::Uint(U256::from(1000u64))]),
            json!("1000")
        );
        assert_eq!(
            outputs_to_json(&[
                Token::Int(U256::MAX),
                Token::Address(address),
                Token::Bytes(vec![1, 2])
            ]),
            json!(["-1", to_checksum(&address, None), "0x0102"])
        );
    }
}
