pub mod canvas;
pub mod coordinate;
pub mod escape_result;
pub mod partition;
pub mod pixel;
pub mod render_job;
pub mod worker_record;
