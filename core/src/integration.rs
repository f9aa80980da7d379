//! Integration tests for the bridge
//!
//! Drive a complete game module through a map load and frames the way a
//! server would, checking the host mirror and the host services it used.

#[cfg(test)]
mod tests {
    use q2wasm_shared::UserCmd;

    use crate::config::BridgeConfig;
    use crate::memory::EntityIndex;
    use crate::test_utils::{SPAWNED_ENTITY, TestHost, game_wasm};
    use crate::wasm::{GameModule, LifecycleState};

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_env_filter("q2wasm_core=debug")
            .try_init();
    }

    fn deathmatch_host() -> TestHost {
        let mut host = TestHost::default();
        host.set_cvar("maxentities", "64");
        host.set_cvar("maxclients", "4");
        host
    }

    // ============================================================================
    // Map Load and Frames
    // ============================================================================

    #[test]
    fn test_spawn_then_idle_frame() {
        init_tracing();
        let mut module = GameModule::new(deathmatch_host(), BridgeConfig::default()).unwrap();
        module.load_bytes(&game_wasm()).unwrap();
        module.init().unwrap();
        assert_eq!(module.edicts().len(), 64);
        assert_eq!(module.num_edicts(), module.max_clients() + 1);

        module.spawn_entities("q2dm1", "", "").unwrap();
        assert!(module.num_edicts() > module.max_clients());
        assert!(module.host().errors.is_empty());

        let before = module.edicts().to_vec();
        module.run_frame().unwrap();
        assert_eq!(module.edicts(), &before[..]);

        let host = module.host();
        assert_eq!(host.traces, 0);
        assert_eq!(host.links.len(), 1);
        assert!(host.errors.is_empty());
    }

    #[test]
    fn test_client_session() {
        init_tracing();
        let mut module = GameModule::new(deathmatch_host(), BridgeConfig::default()).unwrap();
        module.load_bytes(&game_wasm()).unwrap();
        module.init().unwrap();
        module.spawn_entities("q2dm1", "", "").unwrap();

        let player = EntityIndex::new(1);
        let mut userinfo = String::from("\\name\\player\\skin\\male/grunt");
        assert!(module.client_connect(player, &mut userinfo).unwrap());
        module.client_begin(player).unwrap();
        for _ in 0..3 {
            module.client_think(player, &UserCmd::default()).unwrap();
            module.run_frame().unwrap();
        }
        assert!(module.edicts()[1].inuse);

        module.write_level("save/current/q2dm1.sav").unwrap();
        module.write_game("save/current/game.ssv", false).unwrap();
        module.client_disconnect(player).unwrap();
        assert!(!module.edicts()[1].inuse);
        assert!(module.edicts()[SPAWNED_ENTITY as usize].inuse);

        module.shutdown();
        assert_eq!(module.state(), LifecycleState::TornDown);
        assert!(module.host().errors.is_empty());
    }
}
