//! Acceptance tests against the live Fastly API
//!
//! These create and destroy real services. They are skipped unless both
//! `CARINA_ACC` and `FASTLY_API_KEY` are set.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use carina_core::provider::Provider;
use carina_core::resource::{Resource, State, Value};
use carina_provider_fastly::{FastlyConfig, FastlyProvider};

fn acceptance_provider() -> Option<FastlyProvider> {
    if std::env::var("CARINA_ACC").is_err() {
        eprintln!("CARINA_ACC not set, skipping acceptance test");
        return None;
    }
    let config = match FastlyConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}, skipping acceptance test", e);
            return None;
        }
    };
    Some(
        FastlyProvider::new(&config)
            .expect("FASTLY_API_KEY is set but the Fastly client could not be built"),
    )
}

/// Last state of the service under test, destroyed if the test fails
type Tracked = Arc<Mutex<Option<State>>>;

fn track(tracked: &Tracked, state: &State) {
    *tracked.lock().unwrap() = Some(state.clone());
}

/// Run `test` and destroy whatever service it left behind when it fails
async fn run_acceptance<F, Fut>(test: F)
where
    F: FnOnce(Arc<FastlyProvider>, Tracked) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    let Some(provider) = acceptance_provider() else {
        return;
    };
    let provider = Arc::new(provider);
    let tracked = Tracked::default();

    let outcome = tokio::spawn(test(provider.clone(), tracked.clone())).await;
    let Err(failure) = outcome else {
        return;
    };

    let leftover = tracked.lock().unwrap().take();
    if let Some(mut state) = leftover
        && let Some(identifier) = state.identifier.clone()
    {
        state
            .attributes
            .insert("force_destroy".to_string(), Value::Bool(true));
        if let Err(e) = provider.delete(&state.id, &identifier, &state).await {
            eprintln!("Failed to clean up service {}: {}", identifier, e);
        }
    }

    if failure.is_panic() {
        std::panic::resume_unwind(failure.into_panic());
    }
    panic!("acceptance test did not finish: {}", failure);
}

fn rand_string() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..10].to_string()
}

fn block(pairs: &[(&str, &str)]) -> Value {
    let map: HashMap<String, Value> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), Value::from(*v)))
        .collect();
    Value::Map(map)
}

fn service(name: &str, domains: Vec<Value>, backends: Vec<Value>) -> Resource {
    Resource::new("fastly_service_v1", "foo")
        .with_attribute("name", name)
        .with_attribute("domain", Value::List(domains))
        .with_attribute("backend", Value::List(backends))
        .with_attribute("force_destroy", true)
}

fn config_basic(name: &str, domain: &str) -> Resource {
    service(
        name,
        vec![block(&[
            ("name", format!("{}.notadomain.com", domain).as_str()),
            ("comment", "tf-testing-domain"),
        ])],
        vec![block(&[("address", "aws.amazon.com"), ("name", "amazon docs")])],
    )
}

fn config_domain_update(name: &str, domain: &str) -> Resource {
    service(
        name,
        vec![
            block(&[
                ("name", format!("{}.notadomain.com", domain).as_str()),
                ("comment", "tf-testing-domain"),
            ]),
            block(&[
                ("name", format!("{}.notanotherdomain.com", domain).as_str()),
                ("comment", "tf-testing-other-domain"),
            ]),
        ],
        vec![block(&[("address", "aws.amazon.com"), ("name", "amazon docs")])],
    )
}

fn config_backend(name: &str, backend: &str) -> Resource {
    service(
        name,
        vec![block(&[
            ("name", "test.notadomain.com"),
            ("comment", "tf-testing-domain"),
        ])],
        vec![block(&[
            ("address", format!("{}.aws.amazon.com", backend).as_str()),
            ("name", "tf -test backend"),
        ])],
    )
}

fn config_backend_update(name: &str, backend: &str, backend2: &str) -> Resource {
    service(
        name,
        vec![block(&[
            ("name", "test.notadomain.com"),
            ("comment", "tf-testing-domain"),
        ])],
        vec![
            block(&[
                ("address", format!("{}.aws.amazon.com", backend).as_str()),
                ("name", "tf-test-backend"),
            ]),
            block(&[
                ("address", format!("{}.aws.amazon.com", backend2).as_str()),
                ("name", "tf-test-backend-other"),
            ]),
        ],
    )
}

/// Check name and domains of the service's active version
async fn check_attributes(provider: &FastlyProvider, state: &State, name: &str, domains: &[String]) {
    let identifier = state.identifier.as_deref().unwrap();
    let api = provider.api();

    let detail = api.get_service_details(identifier).await.unwrap();
    assert_eq!(
        detail.name, name,
        "Bad name, expected ({}), got ({})",
        name, detail.name
    );

    let active = detail.active_version_number();
    assert!(active > 0, "Service {} has no active version", identifier);
    let mut remote: Vec<String> = api
        .list_domains(identifier, active)
        .await
        .unwrap()
        .into_iter()
        .map(|d| d.name)
        .collect();
    remote.sort();
    let mut expected = domains.to_vec();
    expected.sort();
    assert_eq!(
        remote, expected,
        "Domains did not match, expected ({:?}), got ({:?})",
        expected, remote
    );
}

/// Check name and backend names of the service's active version
async fn check_backends(provider: &FastlyProvider, state: &State, name: &str, backends: &[&str]) {
    let identifier = state.identifier.as_deref().unwrap();
    let api = provider.api();

    let detail = api.get_service_details(identifier).await.unwrap();
    assert_eq!(
        detail.name, name,
        "Bad name, expected ({}), got ({})",
        name, detail.name
    );

    let mut remote: Vec<String> = api
        .list_backends(identifier, detail.active_version_number())
        .await
        .unwrap()
        .into_iter()
        .map(|b| b.name)
        .collect();
    remote.sort();
    let mut expected: Vec<String> = backends.iter().map(|b| b.to_string()).collect();
    expected.sort();
    assert_eq!(
        remote, expected,
        "Backend count mismatch, expected ({:?}), got ({:?})",
        expected, remote
    );
}

/// Destroy the service and check it is gone from the account
async fn destroy_and_check(provider: &FastlyProvider, tracked: &Tracked, state: &State) {
    let identifier = state.identifier.as_deref().unwrap();
    provider.delete(&state.id, identifier, state).await.unwrap();
    tracked.lock().unwrap().take();

    let services = provider.api().list_services().await.unwrap();
    assert!(
        services.iter().all(|s| s.id != identifier),
        "Tried deleting Service ({}), but was still found",
        identifier
    );
}

#[tokio::test]
async fn service_v1_domain() {
    run_acceptance(|provider, tracked| async move {
        let name = rand_string();
        let domain = rand_string();

        let resource = config_basic(&name, &domain);
        let state = provider.create(&resource).await.unwrap();
        track(&tracked, &state);

        check_attributes(
            &provider,
            &state,
            &name,
            &[format!("{}.notadomain.com", domain)],
        )
        .await;
        assert_eq!(state.get("name"), Some(&Value::from(name.as_str())));
        assert_eq!(state.get("active_version"), Some(&Value::Int(1)));
        assert_eq!(
            state.get("domain").and_then(Value::as_list).map(|d| d.len()),
            Some(1)
        );

        destroy_and_check(&provider, &tracked, &state).await;
    })
    .await;
}

#[tokio::test]
async fn service_v1_basic_update_domain() {
    run_acceptance(|provider, tracked| async move {
        let name = rand_string();
        let name_update = rand_string();
        let domain = rand_string();

        let state = provider.create(&config_basic(&name, &domain)).await.unwrap();
        track(&tracked, &state);
        check_attributes(
            &provider,
            &state,
            &name,
            &[format!("{}.notadomain.com", domain)],
        )
        .await;
        assert_eq!(state.get("active_version"), Some(&Value::Int(1)));

        let identifier = state.identifier.clone().unwrap();
        let updated = provider
            .update(
                &state.id,
                &identifier,
                &state,
                &config_domain_update(&name_update, &domain),
            )
            .await
            .unwrap();
        track(&tracked, &updated);

        check_attributes(
            &provider,
            &updated,
            &name_update,
            &[
                format!("{}.notadomain.com", domain),
                format!("{}.notanotherdomain.com", domain),
            ],
        )
        .await;
        assert_eq!(updated.get("name"), Some(&Value::from(name_update.as_str())));
        assert_eq!(updated.get("active_version"), Some(&Value::Int(2)));
        assert_eq!(
            updated.get("domain").and_then(Value::as_list).map(|d| d.len()),
            Some(2)
        );

        destroy_and_check(&provider, &tracked, &updated).await;
    })
    .await;
}

#[tokio::test]
async fn service_v1_basic_update_backend() {
    run_acceptance(|provider, tracked| async move {
        let name = rand_string();
        let backend = rand_string();
        let backend2 = rand_string();

        let state = provider
            .create(&config_backend(&name, &backend))
            .await
            .unwrap();
        track(&tracked, &state);
        check_backends(&provider, &state, &name, &["tf -test backend"]).await;

        let identifier = state.identifier.clone().unwrap();
        let updated = provider
            .update(
                &state.id,
                &identifier,
                &state,
                &config_backend_update(&name, &backend, &backend2),
            )
            .await
            .unwrap();
        track(&tracked, &updated);

        check_backends(
            &provider,
            &updated,
            &name,
            &["tf-test-backend", "tf-test-backend-other"],
        )
        .await;
        assert_eq!(
            updated.get("backend").and_then(Value::as_list).map(|b| b.len()),
            Some(2)
        );

        destroy_and_check(&provider, &tracked, &updated).await;
    })
    .await;
}
