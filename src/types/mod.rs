pub mod location_label;
pub mod observation;
pub mod rows;
pub mod sky_state;
pub mod weather_record;
