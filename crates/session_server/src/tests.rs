
// Include tests
#[cfg(test)]
mod tests {
    use crate::connection::{ConnectionId, ConnectionManager};
    use crate::messaging::{ClientCommand, EventRouter, ServerEvent};
    use crate::room::{Role, RoomCode, RoomRegistry};
    use crate::rules::Side;
    use crate::*;
    use std::sync::Arc;
    use tokio::sync::broadcast;

    const DEFAULT_TIME: u64 = 300;

    /// Router plus a subscription to everything it sends, driven directly
    /// through [`EventRouter::dispatch`] without real sockets.
    struct Harness {
        registry: Arc<RoomRegistry>,
        connections: Arc<ConnectionManager>,
        router: EventRouter,
        receiver: broadcast::Receiver<(ConnectionId, Vec<u8>)>,
    }

    impl Harness {
        fn new() -> Self {
            let connections = Arc::new(ConnectionManager::new());
            let registry = Arc::new(RoomRegistry::new());
            let router = EventRouter::new(registry.clone(), connections.clone(), DEFAULT_TIME);
            let receiver = connections.subscribe();
            Self {
                registry,
                connections,
                router,
                receiver,
            }
        }

        async fn connect(&self) -> ConnectionId {
            self.connections
                .add_connection("127.0.0.1:0".parse().unwrap())
                .await
        }

        async fn send(&self, connection_id: ConnectionId, command: ClientCommand) {
            self.router
                .dispatch(connection_id, command)
                .await
                .expect("dispatch failed");
        }

        /// Next event addressed to the given connection, skipping others.
        async fn next_for(&mut self, target: ConnectionId) -> ServerEvent {
            loop {
                let (addressee, payload) = self.receiver.recv().await.expect("channel closed");
                if addressee == target {
                    return serde_json::from_slice(&payload).expect("undecodable event");
                }
            }
        }

        /// Drains the target's event stream until `pick` accepts one.
        ///
        /// Room membership changes fan out snapshot broadcasts; tests that
        /// assert on a later event use this to skip past them.
        async fn wait_for<F, T>(&mut self, target: ConnectionId, mut pick: F) -> T
        where
            F: FnMut(ServerEvent) -> Option<T>,
        {
            loop {
                let event = self.next_for(target).await;
                if let Some(value) = pick(event) {
                    return value;
                }
            }
        }

        /// Creates a room and returns (host, code).
        async fn host_room(&mut self, base_time: u64) -> (ConnectionId, RoomCode) {
            let host = self.connect().await;
            self.send(host, ClientCommand::HostRoom { base_time }).await;
            match self.next_for(host).await {
                ServerEvent::RoomCreated { room_id, .. } => (host, room_id),
                other => panic!("expected room-created, got {other:?}"),
            }
        }

        /// Runs the full request/approve workflow for a seat or spectator.
        async fn join(
            &mut self,
            host: ConnectionId,
            code: &RoomCode,
            spectator: bool,
        ) -> ConnectionId {
            let guest = self.connect().await;
            self.send(
                guest,
                ClientCommand::RequestJoin {
                    room_id: code.to_string(),
                    spectator,
                },
            )
            .await;
            self.wait_for(host, |event| match event {
                ServerEvent::JoinRequest { requester_id, .. } => {
                    assert_eq!(requester_id, guest);
                    Some(())
                }
                _ => None,
            })
            .await;
            self.send(
                host,
                ClientCommand::ApproveJoin {
                    room_id: code.to_string(),
                    requester_id: guest,
                },
            )
            .await;
            self.wait_for(guest, |event| match event {
                ServerEvent::RoomJoined { .. } => Some(()),
                _ => None,
            })
            .await;
            guest
        }

        async fn start(&self, host: ConnectionId, code: &RoomCode) {
            self.send(
                host,
                ClientCommand::StartGame {
                    room_id: code.to_string(),
                },
            )
            .await;
        }

        async fn make_move(
            &self,
            connection_id: ConnectionId,
            code: &RoomCode,
            from: &str,
            to: &str,
        ) {
            self.send(
                connection_id,
                ClientCommand::MakeMove {
                    room_id: code.to_string(),
                    from: from.into(),
                    to: to.into(),
                    promotion: None,
                },
            )
            .await;
        }
    }

    fn error_message(event: ServerEvent) -> Option<String> {
        match event {
            ServerEvent::ErrorMessage { message } => Some(message),
            _ => None,
        }
    }

    fn game_over(event: ServerEvent) -> Option<String> {
        match event {
            ServerEvent::GameOver { reason } => Some(reason),
            _ => None,
        }
    }

    fn kicked(event: ServerEvent) -> Option<String> {
        match event {
            ServerEvent::Kicked { reason } => Some(reason),
            _ => None,
        }
    }

    #[tokio::test]
    async fn hosting_creates_a_room_with_the_host_as_white() {
        let mut h = Harness::new();
        let host = h.connect().await;
        h.send(host, ClientCommand::HostRoom { base_time: 0 }).await;

        match h.next_for(host).await {
            ServerEvent::RoomCreated {
                room_id,
                role,
                state,
            } => {
                assert_eq!(room_id.as_str().len(), 5);
                assert_eq!(role, Role::White);
                assert_eq!(state.base_time, DEFAULT_TIME);
                assert_eq!(state.white_time, DEFAULT_TIME);
                assert!(state.seats.white);
                assert!(!state.seats.black);
                assert!(!state.running);
            }
            other => panic!("expected room-created, got {other:?}"),
        }
        assert_eq!(h.registry.len().await, 1);
    }

    #[tokio::test]
    async fn hosting_sends_the_presence_view_to_the_host() {
        let mut h = Harness::new();
        let (host, _code) = h.host_room(300).await;

        match h.next_for(host).await {
            ServerEvent::Presence { state, spectators } => {
                assert!(spectators.is_empty());
                assert!(state.seats.white);
                assert!(!state.seats.black);
            }
            other => panic!("expected presence, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn joining_an_unknown_room_is_denied() {
        let mut h = Harness::new();
        let guest = h.connect().await;
        h.send(
            guest,
            ClientCommand::RequestJoin {
                room_id: "ZZZZZ".into(),
                spectator: false,
            },
        )
        .await;

        match h.next_for(guest).await {
            ServerEvent::JoinDenied { reason } => assert_eq!(reason, "Room not found."),
            other => panic!("expected join-denied, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn approved_requester_takes_the_black_seat() {
        let mut h = Harness::new();
        let (host, code) = h.host_room(300).await;

        let guest = h.connect().await;
        h.send(
            guest,
            ClientCommand::RequestJoin {
                room_id: code.to_string(),
                spectator: false,
            },
        )
        .await;
        h.wait_for(host, |event| match event {
            ServerEvent::JoinRequest {
                requester_id,
                spectator,
            } => {
                assert_eq!(requester_id, guest);
                assert!(!spectator);
                Some(())
            }
            _ => None,
        })
        .await;

        h.send(
            host,
            ClientCommand::ApproveJoin {
                room_id: code.to_string(),
                requester_id: guest,
            },
        )
        .await;
        match h.next_for(guest).await {
            ServerEvent::RoomJoined { role, state, .. } => {
                assert_eq!(role, Role::Black);
                assert!(state.seats.black);
            }
            other => panic!("expected room-joined, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn third_seat_requester_is_told_to_spectate() {
        let mut h = Harness::new();
        let (host, code) = h.host_room(300).await;
        h.join(host, &code, false).await;

        let third = h.connect().await;
        h.send(
            third,
            ClientCommand::RequestJoin {
                room_id: code.to_string(),
                spectator: false,
            },
        )
        .await;
        h.send(
            host,
            ClientCommand::ApproveJoin {
                room_id: code.to_string(),
                requester_id: third,
            },
        )
        .await;

        match h.next_for(third).await {
            ServerEvent::JoinDenied { reason } => {
                assert_eq!(reason, "Players are full. Try spectating.")
            }
            other => panic!("expected join-denied, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn denied_requester_learns_the_hosts_decision() {
        let mut h = Harness::new();
        let (host, code) = h.host_room(300).await;

        let guest = h.connect().await;
        h.send(
            guest,
            ClientCommand::RequestJoin {
                room_id: code.to_string(),
                spectator: false,
            },
        )
        .await;
        h.send(
            host,
            ClientCommand::DenyJoin {
                room_id: code.to_string(),
                requester_id: guest,
            },
        )
        .await;

        match h.next_for(guest).await {
            ServerEvent::JoinDenied { reason } => {
                assert_eq!(reason, "Host denied the request.")
            }
            other => panic!("expected join-denied, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn deny_without_a_pending_request_still_notifies() {
        let mut h = Harness::new();
        let (host, code) = h.host_room(300).await;
        let stranger = h.connect().await;

        h.send(
            host,
            ClientCommand::DenyJoin {
                room_id: code.to_string(),
                requester_id: stranger,
            },
        )
        .await;

        match h.next_for(stranger).await {
            ServerEvent::JoinDenied { reason } => {
                assert_eq!(reason, "Host denied the request.")
            }
            other => panic!("expected join-denied, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn spectators_join_without_taking_a_seat() {
        let mut h = Harness::new();
        let (host, code) = h.host_room(300).await;
        h.join(host, &code, false).await;
        h.join(host, &code, true).await;

        let room = h.registry.lookup(&code).await.unwrap();
        let snapshot = room.lock().await.snapshot();
        assert_eq!(snapshot.spectator_count, 1);
        assert!(snapshot.seats.black);
    }

    #[tokio::test]
    async fn starting_without_an_opponent_is_refused() {
        let mut h = Harness::new();
        let (host, code) = h.host_room(300).await;
        h.start(host, &code).await;

        let message = h.wait_for(host, error_message).await;
        assert_eq!(message, "Waiting for opponent to join.");
    }

    #[tokio::test]
    async fn out_of_turn_and_illegal_moves_are_private_rejections() {
        let mut h = Harness::new();
        let (host, code) = h.host_room(300).await;
        let guest = h.join(host, &code, false).await;
        h.start(host, &code).await;

        h.make_move(guest, &code, "e7", "e5").await;
        let message = h.wait_for(guest, error_message).await;
        assert_eq!(message, "Not your turn.");

        h.make_move(host, &code, "e2", "e6").await;
        let message = h.wait_for(host, error_message).await;
        assert_eq!(message, "Illegal move.");

        // Neither rejection touched the room.
        let room = h.registry.lookup(&code).await.unwrap();
        assert!(room.lock().await.snapshot().moves.is_empty());
    }

    #[tokio::test]
    async fn accepted_moves_are_broadcast_to_every_member() {
        let mut h = Harness::new();
        let (host, code) = h.host_room(300).await;
        let guest = h.join(host, &code, false).await;
        h.start(host, &code).await;

        h.make_move(host, &code, "e2", "e4").await;

        for member in [host, guest] {
            let state = h
                .wait_for(member, |event| match event {
                    ServerEvent::RoomState { state } if !state.moves.is_empty() => Some(state),
                    _ => None,
                })
                .await;
            let last = state.last_move.expect("move missing from snapshot");
            assert_eq!(last.from, "e2");
            assert_eq!(last.to, "e4");
            assert_eq!(last.side, Side::White);
            assert_eq!(state.moves.len(), 1);
        }
    }

    #[tokio::test]
    async fn checkmate_ends_the_game_for_all_members() {
        let mut h = Harness::new();
        let (host, code) = h.host_room(300).await;
        let guest = h.join(host, &code, false).await;
        h.start(host, &code).await;

        for (player, from, to) in [
            (host, "f2", "f3"),
            (guest, "e7", "e5"),
            (host, "g2", "g4"),
            (guest, "d8", "h4"),
        ] {
            h.make_move(player, &code, from, to).await;
        }

        for member in [host, guest] {
            let reason = h.wait_for(member, game_over).await;
            assert_eq!(reason, "Checkmate.");
        }

        let room = h.registry.lookup(&code).await.unwrap();
        let room = room.lock().await;
        assert!(room.has_ended());
        assert!(!room.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn clock_expiry_ends_the_game_with_a_timeout_reason() {
        let mut h = Harness::new();
        let (host, code) = h.host_room(300).await;
        let guest = h.join(host, &code, false).await;
        h.start(host, &code).await;

        // White never moves; paused time auto-advances through the ticks
        // while the broadcast stream is drained.
        let reason = h.wait_for(guest, game_over).await;
        assert_eq!(reason, "White ran out of time.");

        match h.next_for(guest).await {
            ServerEvent::RoomState { state } => {
                assert!(!state.running);
                assert_eq!(state.white_time, 0);
            }
            other => panic!("expected final room-state, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn starting_twice_keeps_a_single_clock() {
        let mut h = Harness::new();
        let (host, code) = h.host_room(300).await;
        h.join(host, &code, false).await;
        h.start(host, &code).await;
        h.start(host, &code).await;

        let room = h.registry.lookup(&code).await.unwrap();
        let room = room.lock().await;
        assert!(room.is_running());
        assert!(room.clock_running());
    }

    #[tokio::test]
    async fn reset_is_refused_while_the_clock_runs() {
        let mut h = Harness::new();
        let (host, code) = h.host_room(300).await;
        h.join(host, &code, false).await;
        h.start(host, &code).await;

        h.send(
            host,
            ClientCommand::ResetGame {
                room_id: code.to_string(),
            },
        )
        .await;
        let message = h.wait_for(host, error_message).await;
        assert_eq!(message, "Cannot reset while the game is running.");
        let room = h.registry.lookup(&code).await.unwrap();
        assert!(room.lock().await.is_running());
    }

    #[tokio::test]
    async fn reset_after_game_over_readies_a_fresh_board() {
        let mut h = Harness::new();
        let (host, code) = h.host_room(300).await;
        let guest = h.join(host, &code, false).await;
        h.start(host, &code).await;

        for (player, from, to) in [
            (host, "f2", "f3"),
            (guest, "e7", "e5"),
            (host, "g2", "g4"),
            (guest, "d8", "h4"),
        ] {
            h.make_move(player, &code, from, to).await;
        }
        h.wait_for(host, game_over).await;

        h.send(
            host,
            ClientCommand::ResetGame {
                room_id: code.to_string(),
            },
        )
        .await;
        let state = h
            .wait_for(host, |event| match event {
                ServerEvent::RoomState { state } if state.moves.is_empty() => Some(state),
                _ => None,
            })
            .await;
        assert_eq!(state.last_move, None);
        assert_eq!(state.white_time, 300);

        let room = h.registry.lookup(&code).await.unwrap();
        assert!(!room.lock().await.has_ended());
    }

    #[tokio::test]
    async fn set_time_zero_falls_back_to_the_server_default() {
        let mut h = Harness::new();
        let (host, code) = h.host_room(60).await;
        h.send(
            host,
            ClientCommand::SetTime {
                room_id: code.to_string(),
                base_time: 0,
            },
        )
        .await;

        let state = h
            .wait_for(host, |event| match event {
                ServerEvent::RoomState { state } if state.base_time == DEFAULT_TIME => Some(state),
                _ => None,
            })
            .await;
        assert_eq!(state.white_time, DEFAULT_TIME);
        assert_eq!(state.black_time, DEFAULT_TIME);
    }

    #[tokio::test]
    async fn host_only_commands_from_others_are_ignored() {
        let mut h = Harness::new();
        let (host, code) = h.host_room(300).await;
        let guest = h.join(host, &code, false).await;

        h.send(
            guest,
            ClientCommand::SetTime {
                room_id: code.to_string(),
                base_time: 1,
            },
        )
        .await;
        h.send(
            guest,
            ClientCommand::StartGame {
                room_id: code.to_string(),
            },
        )
        .await;

        let room = h.registry.lookup(&code).await.unwrap();
        let room = room.lock().await;
        assert_eq!(room.base_time(), 300);
        assert!(!room.is_running());
    }

    #[tokio::test]
    async fn kicked_player_is_unseated_and_notified() {
        let mut h = Harness::new();
        let (host, code) = h.host_room(300).await;
        let guest = h.join(host, &code, false).await;

        h.send(
            host,
            ClientCommand::KickPlayer {
                room_id: code.to_string(),
                side: Side::Black,
            },
        )
        .await;

        let reason = h.wait_for(guest, kicked).await;
        assert_eq!(reason, "You were removed by the host.");
        let room = h.registry.lookup(&code).await.unwrap();
        assert_eq!(room.lock().await.seat(Side::Black), None);
    }

    #[tokio::test]
    async fn kicking_all_spectators_empties_the_gallery() {
        let mut h = Harness::new();
        let (host, code) = h.host_room(300).await;
        let watcher_a = h.join(host, &code, true).await;
        let watcher_b = h.join(host, &code, true).await;

        h.send(
            host,
            ClientCommand::KickSpectators {
                room_id: code.to_string(),
            },
        )
        .await;

        for watcher in [watcher_a, watcher_b] {
            let reason = h.wait_for(watcher, kicked).await;
            assert_eq!(reason, "Spectator removed by host.");
        }
        let room = h.registry.lookup(&code).await.unwrap();
        assert_eq!(room.lock().await.snapshot().spectator_count, 0);
    }

    #[tokio::test]
    async fn spectator_disconnect_halts_a_running_game() {
        let mut h = Harness::new();
        let (host, code) = h.host_room(300).await;
        h.join(host, &code, false).await;
        let watcher = h.join(host, &code, true).await;
        h.start(host, &code).await;

        h.router.handle_disconnect(watcher).await.unwrap();

        let room = h.registry.lookup(&code).await.unwrap();
        let room = room.lock().await;
        assert!(!room.is_running());
        assert!(!room.clock_running());
        assert!(room.seats_filled());
        assert_eq!(room.snapshot().spectator_count, 0);
    }

    #[tokio::test]
    async fn host_disconnect_closes_the_room() {
        let mut h = Harness::new();
        let (host, code) = h.host_room(300).await;
        let guest = h.join(host, &code, false).await;

        h.router.handle_disconnect(host).await.unwrap();

        h.wait_for(guest, |event| match event {
            ServerEvent::RoomClosed => Some(()),
            _ => None,
        })
        .await;
        assert!(h.registry.is_empty().await);
    }

    #[tokio::test]
    async fn player_disconnect_halts_a_running_game() {
        let mut h = Harness::new();
        let (host, code) = h.host_room(300).await;
        let guest = h.join(host, &code, false).await;
        h.start(host, &code).await;

        h.router.handle_disconnect(guest).await.unwrap();

        let room = h.registry.lookup(&code).await.unwrap();
        let room = room.lock().await;
        assert!(!room.is_running());
        assert!(!room.clock_running());
        assert_eq!(room.seat(Side::Black), None);
        assert_eq!(h.registry.len().await, 1);
    }

    #[tokio::test]
    async fn server_wiring_exposes_its_components() {
        let server = create_server();
        assert!(server.registry().is_empty().await);
        assert_eq!(server.connection_manager().connection_count().await, 0);
        assert_eq!(server.config().default_base_time, DEFAULT_TIME);

        let custom = create_server_with_config(ServerConfig {
            max_connections: 5,
            ..Default::default()
        });
        assert_eq!(custom.config().max_connections, 5);
    }

    // End-to-end client/server reconciliation over the router.
    #[tokio::test]
    async fn reconciler_follows_the_broadcast_stream() {
        use crate::reconcile::{ClientReconciler, GameStatus};

        let mut h = Harness::new();
        let (host, code) = h.host_room(300).await;
        let guest = h.join(host, &code, false).await;
        h.start(host, &code).await;

        let mut reconciler = ClientReconciler::new();
        h.make_move(host, &code, "e2", "e4").await;
        h.make_move(guest, &code, "e7", "e5").await;

        let mut arrived = Vec::new();
        loop {
            let state = h
                .wait_for(guest, |event| match event {
                    ServerEvent::RoomState { state } => Some(state),
                    _ => None,
                })
                .await;
            let done = state.moves.len() == 2;
            let update = reconciler.apply(&state).unwrap();
            if let Some(record) = update.arrived_move {
                arrived.push((record.from, record.to));
            }
            if done {
                assert_eq!(update.status, GameStatus::TurnOf { side: Side::White });
                break;
            }
        }
        assert_eq!(
            arrived,
            vec![
                ("e2".to_string(), "e4".to_string()),
                ("e7".to_string(), "e5".to_string())
            ]
        );
    }
}
