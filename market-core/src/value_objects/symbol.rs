/// Normalize a trading pair symbol: surrounding whitespace removed, upper-cased.
pub fn format_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_symbol() {
        assert_eq!(format_symbol(" btcusdt "), "BTCUSDT");
        assert_eq!(format_symbol("EthBtc"), "ETHBTC");
        assert_eq!(format_symbol(""), "");
    }
}
