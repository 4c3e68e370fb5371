//! End-to-end fallback through a chain built from configuration.

use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

use decaptcha::config::{ChainOptions, DecaptchaConfig};
use decaptcha::http::HttpClient;
use decaptcha::provider::{RelayChannel, RelayMessage};
use decaptcha::state_machine::AttemptState;
use decaptcha::{Decaptcha, DecodeError, ErrorKind, Provider};

fn config_for(hydati: &MockServer, antigate: &MockServer) -> DecaptchaConfig {
    DecaptchaConfig::parse(&format!(
        r#"
        order = ["hydati", "antigate"]

        [hydati]
        key = "h-key"
        base_url = "{hydati}"

        [hydati.policy]
        initial_delay_secs = 0
        poll_delay_secs = 0
        max_polls = 2

        [antigate]
        key = "a-key"
        host = "{antigate}"

        [antigate.policy]
        initial_delay_secs = 0
        poll_delay_secs = 0
        max_polls = 2
        "#,
        hydati = hydati.uri(),
        antigate = antigate.uri(),
    ))
    .unwrap()
}

async fn hydati_out_of_money() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/uploadpic.php"))
        .respond_with(ResponseTemplate::new(200).set_body_string("#余额不足"))
        .expect(1)
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn falls_back_from_hydati_to_antigate() {
    let hydati = hydati_out_of_money().await;
    let antigate = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/in.php"))
        .respond_with(ResponseTemplate::new(200).set_body_string("OK|31"))
        .mount(&antigate)
        .await;
    Mock::given(method("GET"))
        .and(path("/res.php"))
        .respond_with(ResponseTemplate::new(200).set_body_string("OK|plmk"))
        .mount(&antigate)
        .await;

    let config = config_for(&hydati, &antigate);
    let chain = config
        .build_chain(&HttpClient::new().unwrap(), &ChainOptions::default())
        .unwrap();
    let names: Vec<&str> = chain.iter().map(|p| p.name()).collect();
    assert_eq!(names, vec!["hydati", "antigate"]);

    let result = Decaptcha::new(chain).decode(b"img".to_vec()).await.unwrap();

    assert_eq!(result.provider, "antigate");
    assert_eq!(result.text, "plmk");
    assert_eq!(result.attempts.len(), 2);
    assert_eq!(result.attempts[0].provider, "hydati");
    assert_eq!(result.attempts[0].final_state, AttemptState::Fatal);
    assert_eq!(result.attempts[0].polls, 0);
    assert!(result.attempts[1].solved());
}

#[tokio::test]
async fn whole_chain_exhausted_reports_last_provider() {
    let hydati = hydati_out_of_money().await;
    let antigate = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/in.php"))
        .respond_with(ResponseTemplate::new(200).set_body_string("OK|31"))
        .mount(&antigate)
        .await;
    Mock::given(method("GET"))
        .and(path("/res.php"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ERROR_NO_SLOT_AVAILABLE"))
        .expect(2)
        .mount(&antigate)
        .await;

    let config = config_for(&hydati, &antigate);
    let chain = config
        .build_chain(&HttpClient::new().unwrap(), &ChainOptions::default())
        .unwrap();

    let err = Decaptcha::new(chain).decode(b"img".to_vec()).await.unwrap_err();

    match err {
        DecodeError::AllProvidersExhausted { last, attempts } => {
            assert_eq!(last.provider, "antigate");
            assert_eq!(last.kind, ErrorKind::NoCapacity);
            assert_eq!(attempts.len(), 2);
            assert_eq!(attempts[1].final_state, AttemptState::Exhausted);
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn operator_answers_after_services_fail() {
    let hydati = hydati_out_of_money().await;
    let config = DecaptchaConfig::parse(&format!(
        r#"
        order = ["hydati", "channel_friend"]

        [hydati]
        key = "h-key"
        base_url = "{}"

        [channel_friend.policy]
        initial_delay_secs = 0
        poll_delay_secs = 1
        max_polls = 5
        "#,
        hydati.uri()
    ))
    .unwrap();

    let (relay, mut inbox) = RelayChannel::new();
    let options = ChainOptions {
        only: Vec::new(),
        relay: Some(relay),
    };
    let chain = config
        .build_chain(&HttpClient::new().unwrap(), &options)
        .unwrap();
    drop(options);

    let operator = tokio::spawn(async move {
        if let Some(RelayMessage::Question(question)) = inbox.recv().await {
            assert_eq!(question.image, b"img".to_vec());
            inbox.answer(question.id, "zxcv");
        }
        inbox
    });

    let result = Decaptcha::new(chain).decode(b"img".to_vec()).await.unwrap();
    assert_eq!(result.provider, "channel_friend");
    assert_eq!(result.text, "zxcv");

    let mut inbox = operator.await.unwrap();
    result.feedback.expect("relay accepts reports").send().await;
    assert!(matches!(
        inbox.recv().await,
        Some(RelayMessage::WrongAnswer { .. })
    ));
}
