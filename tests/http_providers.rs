//! Wire-level tests for the HTTP adapters.
//!
//! Each test stands up a wiremock server that speaks one provider's protocol
//! and drives a full decode against it. Policies are overridden to zero
//! delays so the tests run in real time.

use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_string_contains, header, method, path, query_param},
};

use decaptcha::http::HttpClient;
use decaptcha::provider::{Antigate, DeathByCaptcha, Hydati, Jsdati};
use decaptcha::state_machine::AttemptState;
use decaptcha::{Decaptcha, DecodeError, ErrorKind, RetryPolicy};

const IMAGE: &[u8] = b"fake-jpeg-bytes";

fn instant(max_polls: u32) -> RetryPolicy {
    RetryPolicy::from_secs(0, 0, max_polls)
}

fn http() -> HttpClient {
    HttpClient::new().unwrap()
}

#[tokio::test]
async fn antigate_polls_until_answer_and_reports_bad() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/in.php"))
        .and(body_string_contains("name=\"key\""))
        .and(body_string_contains("secret-key"))
        .and(body_string_contains("filename=\"vercode.jpeg\""))
        .respond_with(ResponseTemplate::new(200).set_body_string("OK|4242"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/res.php"))
        .and(query_param("action", "get"))
        .and(query_param("id", "4242"))
        .respond_with(ResponseTemplate::new(200).set_body_string("CAPCHA_NOT_READY"))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/res.php"))
        .and(query_param("action", "get"))
        .respond_with(ResponseTemplate::new(200).set_body_string("OK|x7Kq"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/res.php"))
        .and(query_param("action", "reportbad"))
        .and(query_param("key", "secret-key"))
        .and(query_param("id", "4242"))
        .respond_with(ResponseTemplate::new(200).set_body_string("OK_REPORT_RECORDED"))
        .expect(1)
        .mount(&server)
        .await;

    let antigate = Antigate::with_host(http(), "secret-key", &server.uri()).with_policy(instant(6));
    let result = Decaptcha::new(vec![antigate]).decode(IMAGE).await.unwrap();

    assert_eq!(result.provider, "antigate");
    assert_eq!(result.text, "x7Kq");
    assert_eq!(result.attempts[0].polls, 3);

    result.feedback.expect("antigate supports reports").send().await;
}

#[tokio::test]
async fn antigate_upload_error_skips_polling() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/in.php"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ERROR_ZERO_BALANCE"))
        .mount(&server)
        .await;
    Mock::given(path("/res.php"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let antigate = Antigate::with_host(http(), "k", &server.uri()).with_policy(instant(6));
    let err = Decaptcha::new(vec![antigate]).decode(IMAGE).await.unwrap_err();

    assert_eq!(err.last_kind(), Some(ErrorKind::ZeroBalance));
}

#[tokio::test]
async fn antigate_exhausts_after_max_polls() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/in.php"))
        .respond_with(ResponseTemplate::new(200).set_body_string("OK|7"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/res.php"))
        .respond_with(ResponseTemplate::new(200).set_body_string("CAPCHA_NOT_READY"))
        .expect(3)
        .mount(&server)
        .await;

    let antigate = Antigate::with_host(http(), "k", &server.uri()).with_policy(instant(3));
    let err = Decaptcha::new(vec![antigate]).decode(IMAGE).await.unwrap_err();

    match err {
        DecodeError::AllProvidersExhausted { attempts, .. } => {
            assert_eq!(attempts[0].final_state, AttemptState::Exhausted);
            assert_eq!(attempts[0].polls, 3);
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn deathbycaptcha_follows_location_and_reports() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/captcha"))
        .and(header("accept", "application/json"))
        .and(body_string_contains("name=\"captchafile\""))
        .and(body_string_contains("dbc-user"))
        .respond_with(ResponseTemplate::new(303).insert_header("Location", "/api/captcha/77"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/captcha/77"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"captcha": 77, "text": "", "is_correct": true}"#,
        ))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/captcha/77"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"captcha": 77, "text": "qwer", "is_correct": true}"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/captcha/77/report"))
        .and(body_string_contains("dbc-pass"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let dbc = DeathByCaptcha::with_base_url(http(), "dbc-user", "dbc-pass", &server.uri())
        .with_policy(instant(5));
    let result = Decaptcha::new(vec![dbc]).decode(IMAGE).await.unwrap();

    assert_eq!(result.text, "qwer");
    assert_eq!(result.attempts[0].polls, 2);
    result.feedback.expect("deathbycaptcha supports reports").send().await;
}

#[tokio::test]
async fn deathbycaptcha_answer_in_upload_skips_status_checks() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/captcha"))
        .respond_with(
            ResponseTemplate::new(303)
                .insert_header("Location", "/api/captcha/88")
                .set_body_string(r#"{"captcha": 88, "text": "seen", "is_correct": true}"#),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/captcha/88"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    // A long initial delay must not be waited out.
    let policy = RetryPolicy::from_secs(600, 0, 5);
    let dbc = DeathByCaptcha::with_base_url(http(), "u", "p", &server.uri()).with_policy(policy);
    let result = Decaptcha::new(vec![dbc]).decode(IMAGE).await.unwrap();

    assert_eq!(result.text, "seen");
    assert_eq!(result.attempts[0].polls, 1);
}

#[tokio::test]
async fn deathbycaptcha_forbidden_is_invalid_credentials() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/captcha"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let dbc = DeathByCaptcha::with_base_url(http(), "u", "p", &server.uri()).with_policy(instant(5));
    let err = Decaptcha::new(vec![dbc]).decode(IMAGE).await.unwrap_err();

    assert_eq!(err.last_kind(), Some(ErrorKind::InvalidCredentials));
}

#[tokio::test]
async fn jsdati_reads_redirect_and_json_result() {
    let server = MockServer::start().await;
    let page = format!(
        "<html><script>window.location.href='{}/index.php/demo/55';</script></html>",
        server.uri()
    );
    let referer = format!("{}/index.php/demo", server.uri());

    Mock::given(method("POST"))
        .and(path("/index.php/demo"))
        .and(header("referer", referer.as_str()))
        .and(header("accept-language", "en-us"))
        .and(body_string_contains("name=\"user_yzm\""))
        .and(body_string_contains("name=\"pesubmit\""))
        .respond_with(ResponseTemplate::new(200).set_body_string(page))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/index.php"))
        .and(query_param("mod", "demo"))
        .and(query_param("act", "result"))
        .and(query_param("id", "55"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"status": 1, "result": "wxyz", "damaworker": "w1"}"#,
        ))
        .mount(&server)
        .await;

    let jsdati =
        Jsdati::with_base_url(http(), "user", "pw", &server.uri()).with_policy(instant(6));
    let result = Decaptcha::new(vec![jsdati]).decode(IMAGE).await.unwrap();

    assert_eq!(result.text, "wxyz");
    assert!(result.feedback.is_none());
}

#[tokio::test]
async fn hydati_solves_and_reports_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/uploadpic.php"))
        .and(body_string_contains("name=\"dati_type\""))
        .and(body_string_contains("1000"))
        .and(body_string_contains("hydati-key"))
        .and(body_string_contains("四个字母 不区分大小写"))
        .respond_with(ResponseTemplate::new(200).set_body_string("901"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/query.php"))
        .and(query_param("sid", "901"))
        .respond_with(ResponseTemplate::new(200).set_body_string(""))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/query.php"))
        .respond_with(ResponseTemplate::new(200).set_body_string("AbCd"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/response.php"))
        .and(query_param("action", "error"))
        .and(query_param("auth_code", "hydati-key"))
        .and(query_param("sid", "901"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let hydati = Hydati::with_base_url(http(), "hydati-key", &server.uri()).with_policy(instant(6));
    let result = Decaptcha::new(vec![hydati]).decode(IMAGE).await.unwrap();

    assert_eq!(result.text, "AbCd");
    assert_eq!(result.attempts[0].polls, 2);
    result.feedback.expect("hydati supports reports").send().await;
}

#[tokio::test]
async fn hydati_hash_answer_is_fatal() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/uploadpic.php"))
        .respond_with(ResponseTemplate::new(200).set_body_string("12"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/query.php"))
        .respond_with(ResponseTemplate::new(200).set_body_string("#答题超时"))
        .expect(1)
        .mount(&server)
        .await;

    let hydati = Hydati::with_base_url(http(), "k", &server.uri()).with_policy(instant(6));
    let err = Decaptcha::new(vec![hydati]).decode(IMAGE).await.unwrap_err();

    match err {
        DecodeError::AllProvidersExhausted { last, attempts } => {
            assert_eq!(last.kind, ErrorKind::Unsolvable);
            assert_eq!(last.message, "答题超时");
            assert_eq!(attempts[0].final_state, AttemptState::Fatal);
        }
        other => panic!("unexpected error {other:?}"),
    }
}
