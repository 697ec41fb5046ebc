// MITZEN: typed Michelson interpreter and integrational contract-testing sandbox
//
// SPDX-License-Identifier: Apache-2.0
//
// Written in 2026 by the MITZEN contributors.
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use this file except
// in compliance with the License. You may obtain a copy of the License at
//
//        http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software distributed under the License
// is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express
// or implied. See the License for the specific language governing permissions and limitations under
// the License.

//! Scenario-wide configuration.
//!
//! A plain value type rather than a trait-associated `Conf`, since unlike the teacher's
//! persistence backends a [`Scenario`](crate::scenario::Scenario) has exactly one shape of
//! configuration regardless of what it is testing.

use crate::interpreter::RemainingSteps;

/// The clock and gas budget a [`crate::scenario::Scenario`] starts from.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ScenarioConfig {
    /// The value `NOW` reads until a test calls `set_now`.
    pub now: i64,
    /// The per-transfer/origination gas budget.
    pub max_steps: RemainingSteps,
}

impl Default for ScenarioConfig {
    fn default() -> Self { ScenarioConfig { now: 0, max_steps: RemainingSteps::new(10_000) } }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_a_nonzero_gas_budget() {
        assert!(ScenarioConfig::default().max_steps.remaining() > 0);
    }
}
