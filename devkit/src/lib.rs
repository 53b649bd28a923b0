/*!
# Fleet DevKit - Stubs and helpers for developing against the fleet kernel

- `StubProbe`: scripted liveness probe, no network needed
- `FleetBuilder` / `CsvBuilder`: inventory and upload fixtures
- `TestHarness`: fleet service + stub probe + assertions + router
*/

pub mod fixtures;
pub mod probe_stub;
pub mod test_utils;

pub use fixtures::{CsvBuilder, FleetBuilder};
pub use probe_stub::{StubOutcome, StubProbe};
pub use test_utils::TestHarness;
