pub mod config;
pub mod coordinate;
pub mod geo_distance;
pub mod position_fix;
pub mod replay;
pub mod track_session;
pub mod trip;
