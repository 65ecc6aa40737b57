//! Log output emitted by sessions and the HTTP dispatcher.

use gqlwire::{GraphQLApp, Message, Request};
use gqlwire_testing::{LoggerHandle, Script, ScriptedEngine, TestResult, logger, spawn_app};
use rstest::rstest;
use serial_test::serial;

fn app() -> GraphQLApp<()> {
    GraphQLApp::new(ScriptedEngine::number().on("query { boom }", Script::Panic("boom".into())))
}

#[rstest]
#[tokio::test]
#[serial]
async fn close_codes_are_logged(mut logger: LoggerHandle) -> TestResult {
    let (mut client, session) = spawn_app(&app());
    client.send(&Message::Ping { payload: None })?;
    client.recv_close().await?;
    session.await?;
    assert!(logger.contains("closing session: code=4401, reason=Unauthorized"));
    Ok(())
}

#[rstest]
#[tokio::test]
#[serial]
async fn engine_panics_are_logged(mut logger: LoggerHandle) -> TestResult {
    let (mut client, _session) = spawn_app(&app());
    client.init().await?;
    client.send(&Message::Subscribe {
        id: "p".into(),
        payload: Request::new("query { boom }"),
    })?;
    client.recv_message().await?;
    assert!(logger.contains("execution engine panicked: panic=boom"));
    Ok(())
}

#[rstest]
#[tokio::test]
#[serial]
async fn rejected_http_requests_are_logged(mut logger: LoggerHandle) -> TestResult {
    app().handle_http(gqlwire_testing::http::post("{")?).await;
    assert!(logger.contains("rejected http request: method=POST"));
    Ok(())
}
