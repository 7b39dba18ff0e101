//! Restoring completed jobs from saved results.

use tracing::info;

use crate::error::ServiceResult;
use crate::service::LightscanService;

impl LightscanService {
    /// Register every saved `result_<name>.json` as a completed job.
    ///
    /// Returns how many jobs were restored.
    pub fn restore_completed_jobs(&self) -> ServiceResult<usize> {
        if !self.runtime_config.static_config.storage.restore_results {
            return Ok(0);
        }

        let mut restored = 0;
        for (document_name, summary) in self.artifacts.load_results()? {
            if self.jobs.restore_complete(&document_name, summary) {
                restored += 1;
            }
        }

        if restored > 0 {
            info!(count = restored, "Restored completed jobs from results");
        }
        Ok(restored)
    }
}
