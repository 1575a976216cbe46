mod expense;
mod ledger;
mod money;
mod participant;
mod route_point;
mod settlement;
mod trip;
mod vote;
mod voting;

pub use expense::*;
pub use ledger::*;
pub use money::*;
pub use participant::*;
pub use route_point::*;
pub use settlement::*;
pub use trip::*;
pub use vote::*;
pub use voting::*;
