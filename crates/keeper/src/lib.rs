pub mod composer;
pub mod config;
pub mod decision;
pub mod error;
pub mod flavor;
pub mod keeper;
pub mod ledger;
pub mod reader;
pub mod tracker;

pub use composer::Composer;
pub use config::{KeeperConfig, Mode};
pub use decision::decide;
pub use error::{KeeperError, KeeperResult};
pub use flavor::{CallTable, DirectFlavor, Flavor, VaultFlavor};
pub use keeper::{Keeper, SweepStats};
pub use ledger::{Arg, Call, JsonRpcLedger, Ledger, TxBlock, TxReceipt};
pub use tracker::{DelayGate, OutOfRangeTracker};
