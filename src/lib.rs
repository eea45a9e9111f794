//! Model abstraction contract for federated training and evaluation.
//!
//! The crate centers on the [`Model`] trait: three ordered variable
//! collections (trainable, non-trainable, local), a batch `forward_pass`, and
//! `aggregated_outputs` over the accumulated local state. Around it sit the
//! tensor primitives the contract is expressed in, batch validation against a
//! model's input spec, scalar accumulator helpers, a linear-regression
//! reference implementation, and a versioned snapshot registry.
//!
//! Parameter updates, client/server transport, and update aggregation are the
//! concern of an external orchestration layer, not of this crate.

use anyhow::Result;
use once_cell::sync::OnceCell;
use tracing::info;

static TRACING_INIT: OnceCell<()> = OnceCell::new();

/// Installs the global tracing subscriber. `RUST_LOG` controls filtering;
/// `FED_MODEL_JSON_LOG=1` switches to JSON output. Safe to call repeatedly.
pub fn init_tracing(service: &str) -> Result<()> {
    TRACING_INIT.get_or_try_init(|| {
        let json = std::env::var("FED_MODEL_JSON_LOG")
            .ok()
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        let filter = tracing_subscriber::EnvFilter::from_default_env();
        let result = if json {
            tracing_subscriber::fmt()
                .json()
                .flatten_event(true)
                .with_env_filter(filter)
                .try_init()
        } else {
            tracing_subscriber::fmt()
                .with_target(true)
                .with_line_number(true)
                .with_env_filter(filter)
                .try_init()
        };
        result.map_err(|e| anyhow::anyhow!("tracing init failed: {e}"))
    })?;
    info!(service, "tracing initialized");
    Ok(())
}

pub mod tensor;
pub mod model;
pub mod metrics;
pub mod linear;
pub mod registry;

pub use linear::LinearRegression;
pub use model::{reset_local_variables, validate_batch, BatchOutput, Model, MODEL_METRICS};
pub use registry::{ModelRegistry, ModelSnapshot};
pub use tensor::{Tensor, TensorMap, TensorSpec, Variable};
