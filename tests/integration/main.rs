mod batch;
mod claim;
mod logging;
