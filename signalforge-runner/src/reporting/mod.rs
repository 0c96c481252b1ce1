//! Reporting and export: text summaries, star rating, JSON and CSV.

pub mod export;
pub mod summary;

pub use export::{
    export_equity_csv, export_grid_csv, export_json, export_trades_csv, import_json,
    save_artifacts,
};
pub use summary::{render_grid_summary, render_summary, Rating, RatingCriteria};
