//! Per-token pricing for known models.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Look up (input, output) USD cost per token for a model.
///
/// Unknown models price at zero so cost logging never blocks a call.
pub(crate) fn per_token(model: &str) -> (Decimal, Decimal) {
    if model.starts_with("claude-opus") {
        (dec!(0.000015), dec!(0.000075))
    } else if model.starts_with("claude-sonnet") {
        (dec!(0.000003), dec!(0.000015))
    } else if model.starts_with("claude-haiku") || model.starts_with("claude-3-5-haiku") {
        (dec!(0.0000008), dec!(0.000004))
    } else if model.starts_with("gpt-4o-mini") {
        (dec!(0.00000015), dec!(0.0000006))
    } else if model.starts_with("gpt-4o") {
        (dec!(0.0000025), dec!(0.00001))
    } else {
        (Decimal::ZERO, Decimal::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_models_have_prices() {
        let (input, output) = per_token("claude-sonnet-4-20250514");
        assert!(input > Decimal::ZERO);
        assert!(output > input);

        let (input, output) = per_token("gpt-4o");
        assert!(input > Decimal::ZERO);
        assert!(output > input);
    }

    #[test]
    fn unknown_model_prices_at_zero() {
        assert_eq!(per_token("some-local-model"), (Decimal::ZERO, Decimal::ZERO));
    }
}
