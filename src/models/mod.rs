pub mod account;
pub mod position;
pub mod strategy;
pub mod trade;

pub use account::{BrokerAccount, BrokerAccountPayload, TelegramSetup, TelegramSetupPayload};
pub use position::{ClassifiedTrade, ClosedPosition, OpenPosition, PositionSide};
pub use strategy::{
    BrokerRow, CatalogName, NewUserStrategy, StrategyRow, TelegramRow, UserStrategyRow,
    UserStrategyUpdate,
};
pub use trade::{parse_timestamp, TradeRecord};
