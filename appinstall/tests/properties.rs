//! Property-based tests for inference, gating and execution policy.
//!
//! These tests use proptest to generate random inputs and verify
//! that core invariants hold.

use appinstall::confirm::{ConfirmMode, gate};
use appinstall::executor::{CommandKind, classify, is_ok_to_fail, substitute_pwd};
use appinstall::inference::{InstallOptions, infer_commands};
use appinstall::testing::{FakeRemote, ScriptedPrompter};
use appinstall::InstallError;
use appinstall_common::manifest::Manifest;
use proptest::prelude::*;
use std::collections::BTreeSet;
use std::path::Path;

/// Generate a valid, non-reserved library name.
fn library_strategy() -> impl Strategy<Value = String> {
    "[A-P][A-Z0-9]{0,7}"
}

/// Generate a list of distinct library names in arbitrary order.
fn libraries_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::btree_set(library_strategy(), 1..8)
        .prop_map(|set| set.into_iter().collect::<Vec<_>>())
        .prop_shuffle()
}

fn mode_strategy() -> impl Strategy<Value = ConfirmMode> {
    prop_oneof![
        Just(ConfirmMode::Always),
        Just(ConfirmMode::NonDestructive),
        Just(ConfirmMode::Interactive),
    ]
}

fn lib_files(libraries: &[String]) -> Vec<String> {
    libraries.iter().map(|l| format!("{l}.lib")).collect()
}

proptest! {
    // ========================================================================
    // Inference
    // ========================================================================

    #[test]
    fn inference_follows_artifact_order(libraries in libraries_strategy()) {
        let inference = infer_commands(
            &lib_files(&libraries),
            &InstallOptions::default(),
            Path::new("/tmp/i"),
            "tar",
            &FakeRemote::new(),
        )
        .unwrap();

        let created: Vec<String> = inference
            .plan
            .commands
            .iter()
            .filter_map(|c| c.strip_prefix("CRTSAVF QTEMP/").map(str::to_string))
            .collect();
        prop_assert_eq!(created, libraries.clone());
        prop_assert_eq!(inference.plan.commands.len(), libraries.len() * 4);
    }

    #[test]
    fn inference_is_deterministic(
        libraries in libraries_strategy(),
        load_and_run in any::<bool>(),
        rstasp in proptest::option::of("[0-9]{1,3}"),
    ) {
        let options = InstallOptions {
            load_and_run,
            rstasp,
            ..Default::default()
        };
        let probe = FakeRemote::new().with_object(&format!("/qsys.lib/{}.lib", libraries[0]));
        let files = lib_files(&libraries);
        let first = infer_commands(&files, &options, Path::new("/tmp/i"), "tar", &probe).unwrap();
        let second = infer_commands(&files, &options, Path::new("/tmp/i"), "tar", &probe).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn destructive_iff_existing_and_restoring(
        libraries in libraries_strategy(),
        existing_mask in prop::collection::vec(any::<bool>(), 8),
        load_and_run in any::<bool>(),
    ) {
        let mut probe = FakeRemote::new();
        let mut existing = BTreeSet::new();
        for (library, exists) in libraries.iter().zip(&existing_mask) {
            if *exists {
                probe = probe.with_object(&format!("/qsys.lib/{library}.lib"));
                existing.insert(library.clone());
            }
        }
        let options = InstallOptions { load_and_run, ..Default::default() };
        let inference =
            infer_commands(&lib_files(&libraries), &options, Path::new("/tmp/i"), "tar", &probe)
                .unwrap();

        prop_assert_eq!(
            inference.confirmation.is_destructive(),
            !existing.is_empty() && !load_and_run
        );
        prop_assert_eq!(
            inference.plan.commands.iter().any(|c| c.starts_with("DLTLIB")),
            !load_and_run
        );
    }

    // ========================================================================
    // Confirmation gate
    // ========================================================================

    #[test]
    fn gate_prompts_only_when_required(
        mode in mode_strategy(),
        destructive in any::<bool>(),
        answer in any::<bool>(),
    ) {
        let probe = if destructive {
            FakeRemote::new().with_object("/qsys.lib/APP.lib")
        } else {
            FakeRemote::new()
        };
        let inference = infer_commands(
            &["APP.lib".to_string()],
            &InstallOptions::default(),
            Path::new("/tmp/i"),
            "tar",
            &probe,
        )
        .unwrap();

        let prompter = ScriptedPrompter::new(&[answer]);
        let result = gate(mode, &inference.confirmation, &prompter);
        let must_ask = match mode {
            ConfirmMode::Always => false,
            ConfirmMode::NonDestructive => destructive,
            ConfirmMode::Interactive => true,
        };

        prop_assert_eq!(prompter.asked(), usize::from(must_ask));
        if must_ask && !answer {
            prop_assert!(matches!(result, Err(InstallError::CanceledByUser)));
        } else {
            prop_assert!(result.is_ok());
        }
    }

    // ========================================================================
    // Execution policy
    // ========================================================================

    #[test]
    fn pwd_never_survives_substitution(
        prefix in "[A-Z]{1,8}",
        middle in "[A-Z_ ]{0,10}",
        dir in "/[a-z0-9]{1,8}/[a-z0-9]{1,8}",
    ) {
        let command = format!("{prefix} FROM('$PWD/{middle}') TO('$PWD')");
        let doctored = substitute_pwd(&command, Path::new(&dir));
        prop_assert!(!doctored.contains("$PWD"));
        prop_assert_eq!(doctored.matches(dir.as_str()).count(), 2);
        prop_assert_eq!(classify(&doctored), CommandKind::Remote);
    }

    #[test]
    fn only_deletions_are_ok_to_fail(verb in "[A-Za-z]{3,8}", rest in "[ A-Z()]{0,20}") {
        let command = format!("{verb}{rest}");
        prop_assert_eq!(
            is_ok_to_fail(&command),
            verb.to_uppercase().starts_with("DLT")
        );
    }

    // ========================================================================
    // Manifest
    // ========================================================================

    #[test]
    fn manifest_round_trips(
        files in prop::collection::vec("[A-Za-z0-9._-]{1,20}", 0..6),
        commands in prop::collection::vec("[A-Za-z0-9$/()'* ._-]{1,60}", 0..6),
    ) {
        let manifest = Manifest::new(files, commands);
        let yaml = manifest.to_yaml().unwrap();
        prop_assert_eq!(Manifest::from_yaml(&yaml).unwrap(), manifest);
    }
}
