//! Inbound command tokens, gateway → engine (C11).

use common::types::{Px, Qty, Side, Symbol};
use thiserror::Error;

/// A parsed inbound command line.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    PlaceLimit {
        side: Side,
        symbol: Symbol,
        qty: Qty,
        price: Px,
        client_order_id: String,
    },
    PlaceMarket {
        side: Side,
        symbol: Symbol,
        qty: Qty,
        client_order_id: String,
    },
    Cancel {
        client_order_id: String,
    },
    Ping,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("empty line")]
    Empty,
    #[error("unknown command token: {0}")]
    UnknownToken(String),
    #[error("wrong number of fields for {0}")]
    WrongArity(String),
    #[error("invalid side: {0}")]
    InvalidSide(String),
    #[error("invalid symbol: {0}")]
    InvalidSymbol(String),
    #[error("invalid quantity: {0}")]
    InvalidQty(String),
    #[error("invalid price: {0}")]
    InvalidPrice(String),
}

fn parse_side(token: &str) -> Result<Side, CommandParseError> {
    match token {
        "BUY" => Ok(Side::Buy),
        "SELL" => Ok(Side::Sell),
        other => Err(CommandParseError::InvalidSide(other.to_string())),
    }
}

fn parse_symbol(token: &str) -> Result<Symbol, CommandParseError> {
    token
        .strip_prefix("SYM_")
        .unwrap_or(token)
        .parse::<u32>()
        .map(Symbol::new)
        .map_err(|_| CommandParseError::InvalidSymbol(token.to_string()))
}

fn parse_qty(token: &str) -> Result<Qty, CommandParseError> {
    token
        .parse::<f64>()
        .map(Qty::new)
        .map_err(|_| CommandParseError::InvalidQty(token.to_string()))
}

/// Parse one line of the inbound command protocol. The trailing newline, if
/// present, must already be stripped by the caller.
pub fn parse_command(line: &str) -> Result<Command, CommandParseError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(CommandParseError::Empty);
    }

    let tokens: Vec<&str> = line.split_whitespace().collect();
    match tokens.as_slice() {
        ["PING"] => Ok(Command::Ping),
        ["CANCEL", client_order_id] => Ok(Command::Cancel {
            client_order_id: (*client_order_id).to_string(),
        }),
        ["ORDER", side, symbol, qty, "MARKET", client_order_id] => Ok(Command::PlaceMarket {
            side: parse_side(side)?,
            symbol: parse_symbol(symbol)?,
            qty: parse_qty(qty)?,
            client_order_id: (*client_order_id).to_string(),
        }),
        ["ORDER", side, symbol, qty, price, client_order_id] => Ok(Command::PlaceLimit {
            side: parse_side(side)?,
            symbol: parse_symbol(symbol)?,
            qty: parse_qty(qty)?,
            price: price.parse::<f64>().map(Px::new).map_err(|_| CommandParseError::InvalidPrice((*price).to_string()))?,
            client_order_id: (*client_order_id).to_string(),
        }),
        ["ORDER", ..] => Err(CommandParseError::WrongArity("ORDER".to_string())),
        [unknown, ..] => Err(CommandParseError::UnknownToken((*unknown).to_string())),
        [] => Err(CommandParseError::Empty),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ping() {
        assert_eq!(parse_command("PING"), Ok(Command::Ping));
    }

    #[test]
    fn parses_cancel() {
        assert_eq!(
            parse_command("CANCEL o1"),
            Ok(Command::Cancel { client_order_id: "o1".to_string() })
        );
    }

    #[test]
    fn parses_limit_order() {
        let cmd = parse_command("ORDER BUY SYM_1 0.5 50.25 o1").unwrap();
        assert_eq!(
            cmd,
            Command::PlaceLimit {
                side: Side::Buy,
                symbol: Symbol::new(1),
                qty: Qty::new(0.5),
                price: Px::new(50.25),
                client_order_id: "o1".to_string(),
            }
        );
    }

    #[test]
    fn parses_market_order() {
        let cmd = parse_command("ORDER SELL SYM_2 1.0 MARKET o2").unwrap();
        assert_eq!(
            cmd,
            Command::PlaceMarket {
                side: Side::Sell,
                symbol: Symbol::new(2),
                qty: Qty::new(1.0),
                client_order_id: "o2".to_string(),
            }
        );
    }

    #[test]
    fn rejects_unknown_token() {
        assert_eq!(
            parse_command("FROB x y"),
            Err(CommandParseError::UnknownToken("FROB".to_string()))
        );
    }

    #[test]
    fn rejects_empty_line() {
        assert_eq!(parse_command("   "), Err(CommandParseError::Empty));
    }
}
