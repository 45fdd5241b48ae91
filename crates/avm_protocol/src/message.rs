//! Messages crossing the machine boundary, in both directions.
//!
//! Two value encodings exist and they are intentionally different:
//!
//! - the inbox/outbox form `Tuple(data, token_as_int, currency, dest)`,
//!   produced by [`Message::as_value`];
//! - the canonical stack layout `Tuple(data, dest, amount, token_as_int)`
//!   that programs build for `SEND`/`NBSEND`, decoded by
//!   [`Message::from_stack_tuple`].

use ethereum_types::U256;

use avm_value::Value;

use crate::token::TokenType;

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub data: Value,
    pub token: TokenType,
    pub currency: U256,
    pub dest: U256,
}

impl Message {
    pub fn new(data: Value, token: TokenType, currency: U256, dest: U256) -> Message {
        Message {
            data,
            token,
            currency,
            dest,
        }
    }

    /// The queue encoding: `Tuple(data, token_as_int, currency, dest)`.
    pub fn as_value(&self) -> Value {
        Value::Tuple(
            avm_value::Tuple::from_vec(vec![
                self.data.clone(),
                Value::Int(self.token.as_int()),
                Value::Int(self.currency),
                Value::Int(self.dest),
            ])
            .expect("four fits in a tuple"),
        )
    }

    /// Decode the stack layout `Tuple(data, dest, amount, token_as_int)`
    /// popped by the send opcodes. `None` when the shape is wrong.
    pub fn from_stack_tuple(v: &Value) -> Option<Message> {
        let t = match v {
            Value::Tuple(t) if t.len() == 4 => t,
            _ => return None,
        };
        let data = t.get(0)?.clone();
        let dest = match t.get(1)? {
            Value::Int(n) => *n,
            _ => return None,
        };
        let amount = match t.get(2)? {
            Value::Int(n) => *n,
            _ => return None,
        };
        let token = match t.get(3)? {
            Value::Int(n) => TokenType::from_int(*n),
            _ => return None,
        };
        Some(Message::new(data, token, amount, dest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TOKEN_TYPE_LEN;
    use avm_value::Tuple;

    fn token(first: u8, kind: u8) -> TokenType {
        let mut bytes = [0u8; TOKEN_TYPE_LEN];
        bytes[0] = first;
        bytes[20] = kind;
        TokenType::new(bytes)
    }

    #[test]
    fn stack_tuple_decodes_in_canonical_order() {
        let tok = token(15, 0);
        let v = Value::Tuple(
            Tuple::from_vec(vec![
                Value::int(1u64),
                Value::int(4u64),
                Value::int(7u64),
                Value::Int(tok.as_int()),
            ])
            .unwrap(),
        );
        let msg = Message::from_stack_tuple(&v).expect("well-formed");
        assert_eq!(msg.data, Value::int(1u64));
        assert_eq!(msg.dest, U256::from(4u64));
        assert_eq!(msg.currency, U256::from(7u64));
        assert_eq!(msg.token, tok);
    }

    #[test]
    fn malformed_stack_tuples_are_rejected() {
        assert!(Message::from_stack_tuple(&Value::int(1u64)).is_none());
        assert!(Message::from_stack_tuple(&Value::none()).is_none());
        let short = Value::tuple2(Value::int(1u64), Value::int(2u64));
        assert!(Message::from_stack_tuple(&short).is_none());
        let bad_dest = Value::Tuple(
            Tuple::from_vec(vec![
                Value::int(1u64),
                Value::none(),
                Value::int(7u64),
                Value::int(0u64),
            ])
            .unwrap(),
        );
        assert!(Message::from_stack_tuple(&bad_dest).is_none());
    }

    #[test]
    fn queue_encoding_orders_token_before_currency() {
        let tok = token(16, 1);
        let msg = Message::new(Value::none(), tok, U256::from(7u64), U256::from(4u64));
        match msg.as_value() {
            Value::Tuple(t) => {
                assert_eq!(t.len(), 4);
                assert_eq!(t.get(0), Some(&Value::none()));
                assert_eq!(t.get(1), Some(&Value::Int(tok.as_int())));
                assert_eq!(t.get(2), Some(&Value::int(7u64)));
                assert_eq!(t.get(3), Some(&Value::int(4u64)));
            }
            other => panic!("expected tuple, got {other}"),
        }
    }
}
