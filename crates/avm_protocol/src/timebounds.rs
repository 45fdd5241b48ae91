//! Advisory time bounds for one assertion, observable via `GETTIME`.

use avm_value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeBounds {
    pub lower: u64,
    pub upper: u64,
}

impl TimeBounds {
    pub fn new(lower: u64, upper: u64) -> TimeBounds {
        TimeBounds { lower, upper }
    }

    pub fn as_value(&self) -> Value {
        Value::tuple2(Value::int(self.lower), Value::int(self.upper))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_form_is_a_pair_of_ints() {
        let v = TimeBounds::new(5, 10).as_value();
        assert_eq!(v, Value::tuple2(Value::int(5u64), Value::int(10u64)));
    }
}
