//! Settlement module
//!
//! Boundary to the external rail that actually moves money to the bank.

mod gateway;

pub use gateway::{
    SettlementError, SettlementGateway, SettlementInstruction, SettlementReceipt,
    SimulatedSettlementGateway,
};
