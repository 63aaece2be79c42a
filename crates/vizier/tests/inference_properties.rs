// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2025 Vizier Project
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License version 3
// as published by the Free Software Foundation.
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see https://www.gnu.org/licenses/.

use proptest::prelude::*;
use vizier::{bind_roles, ChartKind, DataProfiler, IntentConfig};

fn csv_from(categories: &[u8], values: &[f64]) -> String {
    let mut csv = String::from("group,value\n");
    for (category, value) in categories.iter().zip(values) {
        csv.push_str(&format!("g{},{}\n", category % 5, value));
    }
    csv
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn profiling_is_idempotent_for_arbitrary_tables(
        categories in prop::collection::vec(any::<u8>(), 1..40),
        values in prop::collection::vec(-1_000_000.0f64..1_000_000.0, 1..40),
    ) {
        let rows = categories.len().min(values.len());
        let csv = csv_from(&categories[..rows], &values[..rows]);
        let table = vizier::ingest::decode(csv.as_bytes(), "prop.csv").expect("decode");
        let profiler = DataProfiler::new();
        let first = profiler.profile_table(&table).expect("profile");
        let second = profiler.profile_table(&table).expect("profile again");
        prop_assert_eq!(first, second);
    }

    #[test]
    fn role_binding_is_deterministic_for_arbitrary_tables(
        categories in prop::collection::vec(any::<u8>(), 2..40),
        values in prop::collection::vec(-1_000_000.0f64..1_000_000.0, 2..40),
    ) {
        let rows = categories.len().min(values.len());
        let csv = csv_from(&categories[..rows], &values[..rows]);
        let table = vizier::ingest::decode(csv.as_bytes(), "prop.csv").expect("decode");
        let profiles = DataProfiler::new().profile_table(&table).expect("profile");
        let config = IntentConfig::default();
        let first = bind_roles(ChartKind::Bar, &profiles, &[], &config);
        for _ in 0..3 {
            let again = bind_roles(ChartKind::Bar, &profiles, &[], &config);
            match (&first, &again) {
                (Ok(a), Ok(b)) => prop_assert_eq!(a, b),
                (Err(_), Err(_)) => {}
                _ => prop_assert!(false, "binding outcome flapped between runs"),
            }
        }
    }
}
