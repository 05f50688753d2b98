// ncdbookmarks managers
// Managers hold the stateful logic: the CSV mirror, reconciliation, and the batch jobs.

pub mod batch_orchestrator;
pub mod csv_store;
pub mod destination_jobs;
pub mod reconciler;
