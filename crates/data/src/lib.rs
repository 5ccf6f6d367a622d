pub mod akshare;
pub mod csv_loader;
pub mod handler;
pub mod storage;

pub use akshare::AkshareClient;
pub use csv_loader::{load_bar_table_from_csv, read_bar_table, ColumnMapping};
pub use handler::{DataHandler, DownloadReport, QueryStatus};
pub use storage::BarStore;
