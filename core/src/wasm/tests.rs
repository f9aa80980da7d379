//! Tests for the WASM engine and game module lifecycle

use super::*;
use crate::config::BridgeConfig;
use crate::error::BoundaryError;
use crate::memory::{EntityIndex, MemoryView, SandboxAddr};
use crate::test_utils::{
    API_VERSION_ADDR, EDICT_BASE, EDICT_STRIDE, FRAME_COUNT_ADDR, FREE_COUNT_ADDR,
    IDLE_ENTITY, LEVEL_INUSE_ADDR, MAP_PTR_ADDR, MODULE_MAX_EDICTS, RESTORED_EDICT_BASE,
    SPAWNED_ENTITY, TestHost, edict_addr, game_wasm, game_wat, ready_module, sandbox_read,
};

fn config_in(dir: &std::path::Path) -> BridgeConfig {
    BridgeConfig {
        module_dir: dir.to_path_buf(),
        ..BridgeConfig::default()
    }
}

// ============================================================================
// SandboxEngine Tests
// ============================================================================

#[test]
fn test_sandbox_engine_creation() {
    assert!(SandboxEngine::new(&BridgeConfig::default()).is_ok());
}

#[test]
fn test_sandbox_engine_load_invalid_module() {
    let engine = SandboxEngine::new(&BridgeConfig::default()).unwrap();
    let result = engine.load_module(b"not valid wasm");
    assert!(matches!(result, Err(BoundaryError::Load(_))));
}

#[test]
fn test_sandbox_engine_load_valid_module() {
    let engine = SandboxEngine::new(&BridgeConfig::default()).unwrap();
    // Minimal valid WASM module (empty module)
    let wasm = wat::parse_str("(module)").unwrap();
    assert!(engine.load_module(&wasm).is_ok());
}

#[test]
fn test_locate_module_prefers_precompiled() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(PORTABLE_MODULE), b"").unwrap();
    assert_eq!(
        SandboxEngine::locate_module(dir.path()).unwrap(),
        dir.path().join(PORTABLE_MODULE)
    );

    std::fs::write(dir.path().join(PRECOMPILED_MODULE), b"").unwrap();
    assert_eq!(
        SandboxEngine::locate_module(dir.path()).unwrap(),
        dir.path().join(PRECOMPILED_MODULE)
    );
}

#[test]
fn test_locate_module_in_empty_directory() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        SandboxEngine::locate_module(dir.path()),
        Err(BoundaryError::ModuleNotFound(_))
    ));
}

// ============================================================================
// Loading
// ============================================================================

#[test]
fn test_init_loads_portable_module_from_directory() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(PORTABLE_MODULE), game_wasm()).unwrap();

    let mut module = GameModule::new(TestHost::default(), config_in(dir.path())).unwrap();
    module.init().unwrap();
    assert_eq!(module.state(), LifecycleState::Ready);
}

#[test]
fn test_init_loads_precompiled_module_from_directory() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    let engine = SandboxEngine::new(&config).unwrap();
    let artifact = engine.precompile(&game_wasm()).unwrap();
    std::fs::write(dir.path().join(PRECOMPILED_MODULE), artifact).unwrap();
    // A broken portable module proves the precompiled one was used
    std::fs::write(dir.path().join(PORTABLE_MODULE), b"broken").unwrap();

    let mut module = GameModule::new(TestHost::default(), config).unwrap();
    module.init().unwrap();
    assert_eq!(module.state(), LifecycleState::Ready);
}

#[test]
fn test_init_without_module_faults() {
    let dir = tempfile::tempdir().unwrap();
    let mut module = GameModule::new(TestHost::default(), config_in(dir.path())).unwrap();
    let err = module.init().unwrap_err();
    assert!(matches!(err, BoundaryError::ModuleNotFound(_)));
    assert_eq!(module.state(), LifecycleState::Faulted);
    assert_eq!(module.host().errors.len(), 1);
}

#[test]
fn test_module_memory_over_heap_limit_is_rejected() {
    let config = BridgeConfig {
        heap_size: 2 * 65536,
        ..BridgeConfig::default()
    };
    let mut module = GameModule::new(TestHost::default(), config).unwrap();
    module.load_bytes(&game_wasm()).unwrap();
    assert!(matches!(module.init(), Err(BoundaryError::Instantiate(_))));
    assert_eq!(module.state(), LifecycleState::Faulted);
}

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn test_lifecycle_reaches_ready() {
    let mut module = GameModule::new(TestHost::default(), BridgeConfig::default()).unwrap();
    assert_eq!(module.state(), LifecycleState::Unloaded);
    module.load_bytes(&game_wasm()).unwrap();
    assert_eq!(module.state(), LifecycleState::Loaded);
    module.init().unwrap();
    assert_eq!(module.state(), LifecycleState::Ready);

    let layout = module.layout().unwrap();
    assert_eq!(layout.base(), SandboxAddr::new(EDICT_BASE));
    assert_eq!(layout.stride(), EDICT_STRIDE);
    assert_eq!(layout.max_edicts(), MODULE_MAX_EDICTS as usize);
    assert_eq!(module.num_edicts(), 5);
    assert!(module.edicts()[0].inuse);

    assert_eq!(sandbox_read::<i32>(&module, API_VERSION_ADDR), 3);
    assert_eq!(module.host().cvar_string("g_features"), Some("1024"));
}

#[test]
fn test_entity_counts_come_from_host_cvars() {
    let mut host = TestHost::default();
    host.set_cvar("maxentities", "64");
    host.set_cvar("maxclients", "4");
    let module = ready_module(host);
    assert_eq!(module.edicts().len(), 64);
    assert_eq!(module.max_clients(), 4);
}

#[test]
fn test_invalid_entity_count_cvar_uses_default() {
    let mut host = TestHost::default();
    host.set_cvar("maxentities", "1");
    let module = GameModule::new(host, BridgeConfig::default()).unwrap();
    assert_eq!(module.edicts().len(), 1024);
    assert_eq!(module.max_clients(), 8);
}

#[test]
fn test_init_twice_is_rejected_without_fault() {
    let mut module = ready_module(TestHost::default());
    assert!(matches!(module.init(), Err(BoundaryError::NotReady(_))));
    assert_eq!(module.state(), LifecycleState::Ready);
    assert!(module.host().errors.is_empty());
}

#[test]
fn test_events_before_init_are_not_ready() {
    let mut module = GameModule::new(TestHost::default(), BridgeConfig::default()).unwrap();
    assert!(matches!(module.run_frame(), Err(BoundaryError::NotReady(_))));
    assert_eq!(module.state(), LifecycleState::Unloaded);
    assert!(module.host().errors.is_empty());
}

#[test]
fn test_missing_export_faults_during_bootstrap() {
    let wat = game_wat().replace(r#"(export "ReadLevel")"#, "");
    let mut module = GameModule::new(TestHost::default(), BridgeConfig::default()).unwrap();
    module.load_bytes(&wat::parse_str(wat).unwrap()).unwrap();
    assert_eq!(module.init(), Err(BoundaryError::MissingExport("ReadLevel")));
    assert_eq!(module.state(), LifecycleState::Faulted);
    assert_eq!(module.host().errors.len(), 1);
}

#[test]
fn test_rejected_api_version_faults() {
    let wat = game_wat().replace(
        "(i32.eq (local.get $version) (i32.const 3))",
        "(i32.const 0)",
    );
    let mut module = GameModule::new(TestHost::default(), BridgeConfig::default()).unwrap();
    module.load_bytes(&wat::parse_str(wat).unwrap()).unwrap();
    assert_eq!(module.init(), Err(BoundaryError::ApiVersionRejected(3)));
    assert_eq!(module.state(), LifecycleState::Faulted);
    assert_eq!(
        module.host().errors,
        vec!["game module rejected game API version 3".to_string()]
    );
}

#[test]
fn test_missing_memory_export_faults() {
    let mut module = GameModule::new(TestHost::default(), BridgeConfig::default()).unwrap();
    module.load_bytes(&wat::parse_str("(module)").unwrap()).unwrap();
    assert_eq!(module.init(), Err(BoundaryError::MissingExport("memory")));
}

#[test]
fn test_layout_beyond_host_array_is_rejected() {
    let mut host = TestHost::default();
    host.set_cvar("maxentities", "32");
    let mut module = GameModule::new(host, BridgeConfig::default()).unwrap();
    module.load_bytes(&game_wasm()).unwrap();
    assert!(matches!(module.init(), Err(BoundaryError::InvalidLayout(_))));
}

#[test]
fn test_trap_faults_and_shutdown_still_succeeds() {
    let mut module = ready_module(TestHost::default());
    let err = module.call_export("exercise_trap").unwrap_err();
    assert!(matches!(err, BoundaryError::Trap { .. }));
    assert_eq!(module.state(), LifecycleState::Faulted);

    module.shutdown();
    assert_eq!(module.state(), LifecycleState::TornDown);
}

#[test]
fn test_shutdown_is_idempotent() {
    let mut module = ready_module(TestHost::default());
    module.spawn_entities("q2dm1", "", "").unwrap();
    module.shutdown();
    module.shutdown();
    assert_eq!(module.state(), LifecycleState::TornDown);
    assert!(module.sandbox_memory().is_none());
    assert!(matches!(module.run_frame(), Err(BoundaryError::NotReady(_))));
}

#[test]
fn test_call_export_unknown_name_does_not_fault() {
    let mut module = ready_module(TestHost::default());
    assert!(matches!(
        module.call_export("no_such_export"),
        Err(BoundaryError::InvalidArgument { .. })
    ));
    assert_eq!(module.state(), LifecycleState::Ready);
}

// ============================================================================
// Game Events
// ============================================================================

#[test]
fn test_run_frame_reaches_module() {
    let mut module = ready_module(TestHost::default());
    module.run_frame().unwrap();
    module.run_frame().unwrap();
    assert_eq!(sandbox_read::<i32>(&module, FRAME_COUNT_ADDR), 2);
}

#[test]
fn test_spawn_releases_previous_level() {
    let mut module = ready_module(TestHost::default());
    module.spawn_entities("q2dm1", "{}", "").unwrap();
    assert_eq!(sandbox_read::<i32>(&module, FREE_COUNT_ADDR), 0);

    let map: u32 = sandbox_read(&module, MAP_PTR_ADDR);
    let name = MemoryView::new(module.sandbox_memory().unwrap())
        .read_cstr(SandboxAddr::new(map))
        .unwrap();
    assert_eq!(name, "q2dm1");

    // One level allocation and three strings from the first map
    module.spawn_entities("q2dm2", "{}", "").unwrap();
    assert_eq!(sandbox_read::<i32>(&module, FREE_COUNT_ADDR), 4);
}

#[test]
fn test_client_connect_returns_modified_userinfo() {
    let mut module = ready_module(TestHost::default());
    let mut userinfo = String::from("\\name\\player");
    let accepted = module
        .client_connect(EntityIndex::new(1), &mut userinfo)
        .unwrap();
    assert!(accepted);
    assert_eq!(userinfo, "\\accepted\\1");

    let client = &module.edicts()[1];
    assert!(client.inuse);
    assert!(client.client.is_some());

    module.client_disconnect(EntityIndex::new(1)).unwrap();
    let client = &module.edicts()[1];
    assert!(!client.inuse);
    assert!(client.client.is_none());
}

#[test]
fn test_client_begin_links_client() {
    let mut module = ready_module(TestHost::default());
    let mut userinfo = String::new();
    module.client_connect(EntityIndex::new(1), &mut userinfo).unwrap();
    module.client_begin(EntityIndex::new(1)).unwrap();
    assert_eq!(module.host().links, vec![EntityIndex::new(1)]);
    assert_eq!(module.edicts()[1].linkcount, 1);
}

#[test]
fn test_event_with_entity_outside_layout_faults() {
    let mut module = ready_module(TestHost::default());
    let err = module.client_begin(EntityIndex::new(MODULE_MAX_EDICTS)).unwrap_err();
    assert!(matches!(err, BoundaryError::InvalidArgument { .. }));
    assert_eq!(module.state(), LifecycleState::Faulted);
}

#[test]
fn test_write_game_passes_normalized_path() {
    let mut module = ready_module(TestHost::default());
    module.write_game("save/current/game.ssv", false).unwrap();
    assert_eq!(
        module.host().console.last().map(String::as_str),
        Some(".saves/save/current/game.ssv")
    );
}

#[test]
fn test_write_level_hides_clients_during_autosave() {
    let mut module = ready_module(TestHost::default());
    let mut userinfo = String::new();
    module.client_connect(EntityIndex::new(1), &mut userinfo).unwrap();

    // A connected host client: an ordinary save
    module.write_level("save/current/q2dm1.sav").unwrap();
    assert_eq!(sandbox_read::<i32>(&module, LEVEL_INUSE_ADDR), 1);

    // No host client in use: an autosave
    module.edicts_mut()[1].inuse = false;
    module.write_level("save/current/q2dm1.sav").unwrap();
    assert_eq!(sandbox_read::<i32>(&module, LEVEL_INUSE_ADDR), 0);
    assert_eq!(sandbox_read::<i32>(&module, edict_addr(1) + 88), 1);
}

#[test]
fn test_read_game_refetches_entity_layout() {
    let mut module = ready_module(TestHost::default());
    module.spawn_entities("q2dm1", "", "").unwrap();
    assert_eq!(module.layout().unwrap().base().get(), EDICT_BASE);

    module.read_game("save/current/game.ssv").unwrap();
    assert_eq!(module.state(), LifecycleState::Ready);
    let layout = module.layout().unwrap();
    assert_eq!(layout.base().get(), RESTORED_EDICT_BASE);
    assert_eq!(layout.stride(), EDICT_STRIDE);

    assert_eq!(module.edicts()[SPAWNED_ENTITY as usize].s.origin.x, 100.0);

    // ReadLevel edits the old array, which is no longer synced
    module.read_level("save/current/q2dm1.sav").unwrap();
    assert_eq!(module.edicts()[IDLE_ENTITY as usize].s.origin.x, 0.0);
}

#[test]
fn test_read_level_syncs_unused_entities() {
    let mut module = ready_module(TestHost::default());
    module.spawn_entities("q2dm1", "", "").unwrap();
    let idle = IDLE_ENTITY as usize;
    assert!(!module.edicts()[idle].inuse);

    // An ordinary event skips entities that stayed unused
    module.call_export("exercise_idle_edit").unwrap();
    assert_eq!(module.edicts()[idle].s.origin.x, 0.0);

    // Loading a level copies every entity in range
    module.read_level("save/current/q2dm1.sav").unwrap();
    assert_eq!(module.state(), LifecycleState::Ready);
    assert_eq!(module.edicts()[idle].s.origin.x, 77.0);
    assert!(!module.edicts()[idle].inuse);
}
