mod plain_aggregates;
mod properties;
mod settings;
