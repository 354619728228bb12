mod entries;
mod feeds;
mod gateway;
mod schema;
mod types;

pub use gateway::StoreGateway;
pub use schema::Database;
pub use types::{
    DatabaseError, Entry, EntrySummary, Feed, ImportReport, InsertOutcome, NewEntry, NewFeed,
};
