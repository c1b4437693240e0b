mod common;

mod conversation {
    use std::net::SocketAddr;

    use fluentify::audio::MediaFrame;
    use fluentify::config::LiveConfig;
    use fluentify::conversation::{Conversation, ConversationUpdate};
    use fluentify::error::FluentifyError;
    use fluentify::transcript::{Speaker, TranscriptTurn};
    use futures::{SinkExt, StreamExt};
    use serde_json::{json, Value};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::oneshot;
    use tokio::time::{sleep, timeout, Duration};
    use tokio_tungstenite::{accept_async, tungstenite::Message, WebSocketStream};

    use crate::common::{FakeMicrophone, ManualClock, RecordingSink};

    type ServerSocket = WebSocketStream<TcpStream>;

    #[tokio::test]
    async fn frames_are_forwarded_only_while_open_and_in_order() {
        let listener = bound_listener().await;
        let address = listener.local_addr().expect("local addr");
        let (go_tx, go_rx) = oneshot::channel::<()>();

        let server = tokio::spawn(async move {
            let mut ws = accept_live(&listener).await;
            go_rx.await.expect("go signal");
            send_json(&mut ws, json!({ "setupComplete": {} })).await;

            let first = recv_json(&mut ws).await;
            let second = recv_json(&mut ws).await;
            vec![first, second]
        });

        let (microphone, mic_state) = FakeMicrophone::new();
        let (clock, _) = ManualClock::new();
        let (sink, _) = RecordingSink::new();
        let mut conversation = Conversation::new(
            test_config(address),
            Box::new(microphone),
            Box::new(clock),
            Box::new(sink),
        );

        conversation.start().await.expect("start should succeed");
        wait_for_status(&mut conversation, "connecting").await;

        // Produced before setup completes, so it must be dropped.
        mic_state.push_frame(vec![0.9; 4]);
        sleep(Duration::from_millis(100)).await;
        go_tx.send(()).expect("server should be waiting");
        wait_for_status(&mut conversation, "connected").await;

        let frame_b = vec![0.25; 4];
        let frame_c = vec![-0.5; 4];
        mic_state.push_frame(frame_b.clone());
        mic_state.push_frame(frame_c.clone());

        let received = server.await.expect("server task should complete");
        let expected_b = MediaFrame::from_samples(&frame_b, 16_000);
        let expected_c = MediaFrame::from_samples(&frame_c, 16_000);
        assert_eq!(
            received[0]["realtimeInput"]["media"]["data"],
            expected_b.data
        );
        assert_eq!(
            received[0]["realtimeInput"]["media"]["mimeType"],
            "audio/pcm;rate=16000"
        );
        assert_eq!(
            received[1]["realtimeInput"]["media"]["data"],
            expected_c.data
        );

        conversation.stop().await.expect("stop should succeed");
        assert_eq!(mic_state.stop_count(), 1);
    }

    #[tokio::test]
    async fn committed_turns_arrive_trimmed_in_user_then_assistant_order() {
        let listener = bound_listener().await;
        let address = listener.local_addr().expect("local addr");

        let server = tokio::spawn(async move {
            let mut ws = accept_live(&listener).await;
            send_json(&mut ws, json!({ "setupComplete": {} })).await;

            // A turn of pure whitespace commits nothing.
            send_json(
                &mut ws,
                json!({ "serverContent": { "inputTranscription": { "text": "   " } } }),
            )
            .await;
            send_json(&mut ws, json!({ "serverContent": { "turnComplete": true } })).await;

            send_json(
                &mut ws,
                json!({ "serverContent": { "inputTranscription": { "text": "  Hello" } } }),
            )
            .await;
            send_json(
                &mut ws,
                json!({ "serverContent": { "inputTranscription": { "text": " there " } } }),
            )
            .await;
            send_json(
                &mut ws,
                json!({ "serverContent": { "outputTranscription": { "text": "Hi!" } } }),
            )
            .await;
            send_json(&mut ws, json!({ "serverContent": { "turnComplete": true } })).await;

            hold_until_closed(ws).await;
        });

        let (microphone, _mic_state) = FakeMicrophone::new();
        let (clock, _) = ManualClock::new();
        let (sink, _) = RecordingSink::new();
        let mut conversation = Conversation::new(
            test_config(address),
            Box::new(microphone),
            Box::new(clock),
            Box::new(sink),
        );

        conversation.start().await.expect("start should succeed");

        let first = wait_for_turn(&mut conversation).await;
        assert_eq!(
            first,
            TranscriptTurn {
                speaker: Speaker::User,
                text: "Hello there".into(),
            }
        );
        let second = wait_for_turn(&mut conversation).await;
        assert_eq!(
            second,
            TranscriptTurn {
                speaker: Speaker::Assistant,
                text: "Hi!".into(),
            }
        );

        conversation.stop().await.expect("stop should succeed");
        server.await.expect("server task should complete");
    }

    #[tokio::test]
    async fn interruption_cancels_pending_playback_and_reschedules_from_now() {
        let listener = bound_listener().await;
        let address = listener.local_addr().expect("local addr");

        let server = tokio::spawn(async move {
            let mut ws = accept_live(&listener).await;
            send_json(&mut ws, json!({ "setupComplete": {} })).await;

            let audio = json!({
                "serverContent": {
                    "modelTurn": { "parts": [{ "inlineData": { "data": "AQACAA==" } }] }
                }
            });
            send_json(&mut ws, audio.clone()).await;
            send_json(&mut ws, audio.clone()).await;
            send_json(&mut ws, json!({ "serverContent": { "interrupted": true } })).await;
            send_json(&mut ws, audio).await;
            send_json(
                &mut ws,
                json!({ "serverContent": { "inputTranscription": { "text": "done" } } }),
            )
            .await;
            send_json(&mut ws, json!({ "serverContent": { "turnComplete": true } })).await;

            hold_until_closed(ws).await;
        });

        let (microphone, _mic_state) = FakeMicrophone::new();
        let (clock, _time) = ManualClock::new();
        let (sink, sink_log) = RecordingSink::new();
        let mut conversation = Conversation::new(
            test_config(address),
            Box::new(microphone),
            Box::new(clock),
            Box::new(sink),
        );

        conversation.start().await.expect("start should succeed");
        // The turn commit is ordered after the interruption, so once it arrives
        // the sink log is complete.
        let _ = wait_for_turn(&mut conversation).await;

        let chunk_secs = 2.0 / 24_000.0;
        let log = sink_log.lock().expect("sink log lock");
        assert_eq!(log.started.len(), 3);
        assert_eq!(log.stopped, vec![1, 2]);
        assert_eq!(log.started[0].1, 0.0);
        assert!((log.started[1].1 - chunk_secs).abs() < 1e-9);
        // The cursor was reset, so the post-interrupt chunk plays immediately.
        assert_eq!(log.started[2].1, 0.0);
        drop(log);

        conversation.stop().await.expect("stop should succeed");
        server.await.expect("server task should complete");
    }

    #[tokio::test]
    async fn stop_before_start_is_a_noop() {
        let (microphone, mic_state) = FakeMicrophone::new();
        let (clock, _) = ManualClock::new();
        let (sink, _) = RecordingSink::new();
        let mut conversation = Conversation::new(
            test_config(([127, 0, 0, 1], 9).into()),
            Box::new(microphone),
            Box::new(clock),
            Box::new(sink),
        );

        conversation.stop().await.expect("first stop");
        conversation.stop().await.expect("second stop");
        assert!(!conversation.is_active());
        assert_eq!(mic_state.start_count(), 0);
        assert_eq!(mic_state.stop_count(), 0);
    }

    #[tokio::test]
    async fn restart_replaces_the_active_session() {
        let listener = bound_listener().await;
        let address = listener.local_addr().expect("local addr");

        let server = tokio::spawn(async move {
            let mut first = accept_live(&listener).await;
            send_json(&mut first, json!({ "setupComplete": {} })).await;

            let mut second = accept_live(&listener).await;
            send_json(&mut second, json!({ "setupComplete": {} })).await;

            hold_until_closed(first).await;
            hold_until_closed(second).await;
        });

        let (microphone, mic_state) = FakeMicrophone::new();
        let (clock, _) = ManualClock::new();
        let (sink, _) = RecordingSink::new();
        let mut conversation = Conversation::new(
            test_config(address),
            Box::new(microphone),
            Box::new(clock),
            Box::new(sink),
        );

        conversation.start().await.expect("first start");
        wait_for_status(&mut conversation, "connected").await;

        conversation.start().await.expect("second start");
        wait_for_status(&mut conversation, "connected").await;

        assert!(conversation.is_active());
        assert_eq!(mic_state.start_count(), 2);
        assert_eq!(mic_state.stop_count(), 1);

        conversation.stop().await.expect("stop should succeed");
        assert_eq!(mic_state.stop_count(), 2);
        server.await.expect("server task should complete");
    }

    #[tokio::test]
    async fn microphone_permission_denial_blocks_start() {
        let (clock, _) = ManualClock::new();
        let (sink, _) = RecordingSink::new();
        let mut conversation = Conversation::new(
            test_config(([127, 0, 0, 1], 9).into()),
            Box::new(FakeMicrophone::denied()),
            Box::new(clock),
            Box::new(sink),
        );

        let error = conversation.start().await.expect_err("start should fail");
        assert!(matches!(error, FluentifyError::PermissionDenied(_)));
        assert!(!conversation.is_active());

        let status = wait_for_status(&mut conversation, "microphone unavailable").await;
        assert!(status.contains("denied"));
    }

    #[tokio::test]
    async fn unexpected_remote_close_is_reported() {
        let listener = bound_listener().await;
        let address = listener.local_addr().expect("local addr");

        let server = tokio::spawn(async move {
            let mut ws = accept_live(&listener).await;
            send_json(&mut ws, json!({ "setupComplete": {} })).await;
            ws.close(None).await.expect("server close should send");
        });

        let (microphone, mic_state) = FakeMicrophone::new();
        let (clock, _) = ManualClock::new();
        let (sink, _) = RecordingSink::new();
        let mut conversation = Conversation::new(
            test_config(address),
            Box::new(microphone),
            Box::new(clock),
            Box::new(sink),
        );

        conversation.start().await.expect("start should succeed");
        wait_for_status(&mut conversation, "connected").await;
        wait_for_status(&mut conversation, "connection closed unexpectedly").await;

        let closed = wait_for_update(&mut conversation, |update| {
            matches!(update, ConversationUpdate::Closed)
        })
        .await;
        assert_eq!(closed, ConversationUpdate::Closed);

        conversation.stop().await.expect("stop should recover");
        assert!(!conversation.is_active());
        assert_eq!(mic_state.stop_count(), 1);
        server.await.expect("server task should complete");
    }

    #[tokio::test]
    async fn undecodable_audio_is_dropped_without_ending_the_session() {
        let listener = bound_listener().await;
        let address = listener.local_addr().expect("local addr");

        let server = tokio::spawn(async move {
            let mut ws = accept_live(&listener).await;
            send_json(&mut ws, json!({ "setupComplete": {} })).await;
            send_json(
                &mut ws,
                json!({
                    "serverContent": {
                        "modelTurn": { "parts": [{ "inlineData": { "data": "%%%" } }] }
                    }
                }),
            )
            .await;
            send_json(
                &mut ws,
                json!({ "serverContent": { "inputTranscription": { "text": "still here" } } }),
            )
            .await;
            send_json(&mut ws, json!({ "serverContent": { "turnComplete": true } })).await;

            hold_until_closed(ws).await;
        });

        let (microphone, _mic_state) = FakeMicrophone::new();
        let (clock, _) = ManualClock::new();
        let (sink, sink_log) = RecordingSink::new();
        let mut conversation = Conversation::new(
            test_config(address),
            Box::new(microphone),
            Box::new(clock),
            Box::new(sink),
        );

        conversation.start().await.expect("start should succeed");
        let turn = wait_for_turn(&mut conversation).await;
        assert_eq!(turn.text, "still here");
        assert!(sink_log.lock().expect("sink log lock").started.is_empty());
        assert!(conversation.is_active());

        conversation.stop().await.expect("stop should succeed");
        server.await.expect("server task should complete");
    }

    async fn bound_listener() -> TcpListener {
        TcpListener::bind("127.0.0.1:0")
            .await
            .expect("listener should bind")
    }

    fn test_config(address: SocketAddr) -> LiveConfig {
        let mut config = LiveConfig::default();
        config.api_key = Some("test-key".into());
        config.base_url = format!("ws://{address}/live");
        config
    }

    /// Accept one client and consume its setup message.
    async fn accept_live(listener: &TcpListener) -> ServerSocket {
        let (stream, _) = listener.accept().await.expect("server should accept");
        let mut ws = accept_async(stream).await.expect("handshake should succeed");
        let setup = recv_text(&mut ws).await;
        assert!(setup.contains("\"setup\""), "expected setup, got: {setup}");
        ws
    }

    async fn send_json(ws: &mut ServerSocket, value: Value) {
        ws.send(Message::Text(value.to_string().into()))
            .await
            .expect("server send should succeed");
    }

    async fn recv_text(ws: &mut ServerSocket) -> String {
        loop {
            let frame = timeout(Duration::from_secs(2), ws.next())
                .await
                .expect("frame wait should not timeout")
                .expect("frame should exist")
                .expect("frame should parse");
            match frame {
                Message::Text(text) => return text.to_string(),
                Message::Ping(_) | Message::Pong(_) => continue,
                other => panic!("unexpected frame: {other:?}"),
            }
        }
    }

    async fn recv_json(ws: &mut ServerSocket) -> Value {
        let text = recv_text(ws).await;
        serde_json::from_str(&text).expect("frame should be JSON")
    }

    /// Keep the socket open until the client closes it.
    async fn hold_until_closed(mut ws: ServerSocket) {
        let _ = timeout(Duration::from_secs(5), async {
            while let Some(frame) = ws.next().await {
                if matches!(frame, Ok(Message::Close(_)) | Err(_)) {
                    break;
                }
            }
        })
        .await;
    }

    async fn wait_for_update<F>(conversation: &mut Conversation, mut predicate: F) -> ConversationUpdate
    where
        F: FnMut(&ConversationUpdate) -> bool,
    {
        loop {
            let update = timeout(Duration::from_secs(2), conversation.next_update())
                .await
                .expect("waiting for update should not timeout")
                .expect("update stream should stay open");
            if predicate(&update) {
                return update;
            }
        }
    }

    async fn wait_for_status(conversation: &mut Conversation, needle: &str) -> String {
        let update = wait_for_update(conversation, |update| {
            matches!(update, ConversationUpdate::Status(text) if text.contains(needle))
        })
        .await;
        match update {
            ConversationUpdate::Status(text) => text,
            other => panic!("expected status, got {other:?}"),
        }
    }

    async fn wait_for_turn(conversation: &mut Conversation) -> TranscriptTurn {
        let update = wait_for_update(conversation, |update| {
            matches!(update, ConversationUpdate::Turn(_))
        })
        .await;
        match update {
            ConversationUpdate::Turn(turn) => turn,
            other => panic!("expected turn, got {other:?}"),
        }
    }
}
