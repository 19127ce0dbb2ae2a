//! Per-token pricing for known models.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Input and output cost per token for a model, or zero when unknown.
pub fn model_cost(model: &str) -> (Decimal, Decimal) {
    let per_million = match model {
        m if m.starts_with("gpt-4o-mini") => (dec!(0.15), dec!(0.60)),
        m if m.starts_with("gpt-4o") => (dec!(2.50), dec!(10.00)),
        m if m.contains("haiku") => (dec!(0.80), dec!(4.00)),
        m if m.contains("sonnet") => (dec!(3.00), dec!(15.00)),
        m if m.contains("opus") => (dec!(15.00), dec!(75.00)),
        _ => (Decimal::ZERO, Decimal::ZERO),
    };
    let million = dec!(1_000_000);
    (per_million.0 / million, per_million.1 / million)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mini_is_not_priced_as_full_gpt4o() {
        let (mini_in, _) = model_cost("gpt-4o-mini");
        let (full_in, _) = model_cost("gpt-4o");
        assert!(mini_in < full_in);
    }

    #[test]
    fn unknown_model_is_free() {
        assert_eq!(model_cost("local-llama"), (Decimal::ZERO, Decimal::ZERO));
    }
}
