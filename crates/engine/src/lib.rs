pub mod annotations;
pub mod cell;
pub mod chart;
pub mod command;
pub mod coord;
pub mod document;
pub mod events;
pub mod history;
pub mod search;
pub mod sheet;
pub mod stats;
pub mod style;
pub mod store;
