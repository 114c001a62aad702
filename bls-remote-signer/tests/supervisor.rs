//! End-to-end tests running the real `bls12381svc` under the supervisor.

use std::thread;
use std::time::{Duration, Instant};

use bls_backend::{
    Backend, BackendError, BackendKind, BackendSwitch, EmbeddedBinary, LocalBackend,
    RemoteBackend, SupervisorConfig, SIGNATURE_SIZE,
};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tempfile::TempDir;

const MESSAGE: &[u8] = b"the same fixed message";

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn service_binary() -> EmbeddedBinary {
    init_tracing();
    EmbeddedBinary::from_file(env!("CARGO_BIN_EXE_bls12381svc")).unwrap()
}

fn config(temp_dir: &TempDir) -> SupervisorConfig {
    SupervisorConfig::in_dir(temp_dir.path()).with_handshake_timeout(Duration::from_secs(10))
}

fn remote(temp_dir: &TempDir) -> RemoteBackend {
    RemoteBackend::new(config(temp_dir), service_binary())
}

#[test]
fn test_connect_is_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    let backend = remote(&temp_dir);

    backend.connect().unwrap();
    let pid = backend.supervisor().child_id().unwrap();

    backend.connect().unwrap();
    assert_eq!(backend.supervisor().child_id(), Some(pid));

    backend.disconnect().unwrap();
}

#[test]
fn test_remote_operations() {
    let temp_dir = TempDir::new().unwrap();
    let backend = remote(&temp_dir);
    backend.connect().unwrap();

    let keys = backend.generate_keys().unwrap();
    let sig = backend
        .sign(&keys.secret_key, &keys.public_key, MESSAGE)
        .unwrap();
    assert_eq!(sig.len(), SIGNATURE_SIZE);

    let apk = backend.create_apk(&keys.public_key).unwrap();
    assert_eq!(backend.verify(&apk, &sig, MESSAGE), Ok(()));
    assert_eq!(
        backend.verify(&apk, &sig, b"some other message"),
        Err(BackendError::InvalidSignature)
    );

    // Wrong sizes come back as input errors over the live connection.
    assert!(matches!(
        backend.sign(&keys.secret_key[..31], &keys.public_key, MESSAGE),
        Err(BackendError::InvalidInput(_))
    ));
    assert_eq!(backend.verify(&apk, &sig, MESSAGE), Ok(()));

    backend.disconnect().unwrap();
}

#[test]
fn test_disconnect_removes_artifacts() {
    let temp_dir = TempDir::new().unwrap();
    let config = config(&temp_dir);
    let socket_path = config.socket_path.clone();
    let binary_path = config.binary_path.clone();
    let backend = RemoteBackend::new(config, service_binary());

    backend.connect().unwrap();
    assert!(socket_path.exists());
    assert!(binary_path.exists());

    backend.disconnect().unwrap();
    assert!(!backend.is_connected());
    assert!(!socket_path.exists());
    assert!(!binary_path.exists());

    assert!(matches!(
        backend.generate_keys(),
        Err(BackendError::TransportUnavailable(_))
    ));
    assert!(matches!(
        backend.verify(&[0; 96], &[0; 48], MESSAGE),
        Err(BackendError::TransportUnavailable(_))
    ));

    // A second disconnect is a no-op.
    backend.disconnect().unwrap();
}

#[test]
fn test_reconnect_after_disconnect() {
    let temp_dir = TempDir::new().unwrap();
    let backend = remote(&temp_dir);

    backend.connect().unwrap();
    let first = backend.supervisor().child_id().unwrap();
    backend.disconnect().unwrap();

    backend.connect().unwrap();
    let second = backend.supervisor().child_id().unwrap();
    assert_ne!(first, second);
    assert!(backend.generate_keys().is_ok());

    backend.disconnect().unwrap();
}

#[test]
fn test_switch_between_backends() {
    let temp_dir = TempDir::new().unwrap();
    let switch = BackendSwitch::new(remote(&temp_dir));

    let local_keys = switch.generate_keys().unwrap();
    let local_sig = switch
        .sign(&local_keys.secret_key, &local_keys.public_key, MESSAGE)
        .unwrap();
    let local_apk = switch.create_apk(&local_keys.public_key).unwrap();

    switch.activate_remote().unwrap();
    assert_eq!(switch.active(), BackendKind::Remote);
    assert_eq!(switch.name(), "remote");

    // Both backends produce interchangeable bytes.
    let remote_sig = switch
        .sign(&local_keys.secret_key, &local_keys.public_key, MESSAGE)
        .unwrap();
    assert_eq!(remote_sig, local_sig);
    assert_eq!(switch.create_apk(&local_keys.public_key).unwrap(), local_apk);
    assert_eq!(switch.verify(&local_apk, &local_sig, MESSAGE), Ok(()));

    let remote_keys = switch.generate_keys().unwrap();
    let remote_sig = switch
        .sign(&remote_keys.secret_key, &remote_keys.public_key, MESSAGE)
        .unwrap();
    let remote_apk = switch.create_apk(&remote_keys.public_key).unwrap();

    switch.activate_local().unwrap();
    assert_eq!(switch.active(), BackendKind::Local);
    assert!(!switch.remote().is_connected());
    assert_eq!(switch.verify(&remote_apk, &remote_sig, MESSAGE), Ok(()));
}

#[test]
fn test_three_party_aggregate_over_service() {
    let temp_dir = TempDir::new().unwrap();
    let backend = remote(&temp_dir);
    backend.connect().unwrap();

    let parties: Vec<_> = (0..3)
        .map(|_| {
            let keys = backend.generate_keys().unwrap();
            let sig = backend
                .sign(&keys.secret_key, &keys.public_key, MESSAGE)
                .unwrap();
            (keys, sig)
        })
        .collect();
    let pks: Vec<&[u8]> = parties
        .iter()
        .map(|(keys, _)| keys.public_key.as_slice())
        .collect();
    let sigs: Vec<&[u8]> = parties.iter().map(|(_, sig)| sig.as_slice()).collect();

    let base = backend.create_apk(pks[0]).unwrap();
    let apk = backend.aggregate_pk(&base, &pks[1..]).unwrap();
    let sig = backend.aggregate_sig(sigs[0], &sigs[1..]).unwrap();
    assert_eq!(backend.verify(&apk, &sig, MESSAGE), Ok(()));

    // Two of the three keys do not cover the aggregate signature.
    let partial = backend.aggregate_pk(&base, &pks[1..2]).unwrap();
    assert_eq!(
        backend.verify(&partial, &sig, MESSAGE),
        Err(BackendError::InvalidSignature)
    );

    backend.disconnect().unwrap();
}

#[test]
fn test_supervisor_drop_stops_service() {
    let temp_dir = TempDir::new().unwrap();
    let config = config(&temp_dir);
    let socket_path = config.socket_path.clone();

    {
        let backend = RemoteBackend::new(config, service_binary());
        backend.connect().unwrap();
        assert!(socket_path.exists());
    }

    assert!(!socket_path.exists());
}

#[test]
fn test_large_message_signs_remotely() {
    let temp_dir = TempDir::new().unwrap();
    let backend = remote(&temp_dir);
    backend.connect().unwrap();

    let local = LocalBackend::new();
    let keys = local.generate_keys().unwrap();
    let message = vec![7u8; 5 << 20];

    let local_sig = local
        .sign(&keys.secret_key, &keys.public_key, &message)
        .unwrap();
    let remote_sig = backend
        .sign(&keys.secret_key, &keys.public_key, &message)
        .unwrap();
    assert_eq!(remote_sig, local_sig);

    let apk = local.create_apk(&keys.public_key).unwrap();
    assert_eq!(backend.verify(&apk, &remote_sig, &message), Ok(()));

    backend.disconnect().unwrap();
}

#[test]
fn test_service_crash_is_detected() {
    let temp_dir = TempDir::new().unwrap();
    let config = config(&temp_dir);
    let socket_path = config.socket_path.clone();
    let binary_path = config.binary_path.clone();
    let backend = RemoteBackend::new(config, service_binary());

    backend.connect().unwrap();
    let pid = backend.supervisor().child_id().unwrap();
    kill(Pid::from_raw(pid as i32), Signal::SIGKILL).unwrap();

    let deadline = Instant::now() + Duration::from_secs(10);
    while backend.is_connected() {
        assert!(Instant::now() < deadline, "killed service still reported as connected");
        thread::sleep(Duration::from_millis(10));
    }
    assert!(matches!(
        backend.generate_keys(),
        Err(BackendError::TransportUnavailable(_))
    ));
    assert!(!socket_path.exists());
    assert!(!binary_path.exists());

    // A fresh service replaces the dead one.
    backend.connect().unwrap();
    assert_ne!(backend.supervisor().child_id(), Some(pid));
    assert!(backend.generate_keys().is_ok());

    backend.disconnect().unwrap();
}

#[test]
fn test_rpc_after_crash_reports_transport() {
    let temp_dir = TempDir::new().unwrap();
    let backend = remote(&temp_dir);

    backend.connect().unwrap();
    let pid = backend.supervisor().child_id().unwrap();
    kill(Pid::from_raw(pid as i32), Signal::SIGKILL).unwrap();

    // Whether the call races the exit or follows it, the dead child is
    // never reported as a signature failure and is eventually dropped.
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        match backend.verify(&[0; 96], &[0; 48], MESSAGE) {
            Err(BackendError::TransportUnavailable(_)) if !backend.is_connected() => break,
            Err(BackendError::TransportUnavailable(_)) => {}
            // Replies sent before the signal landed.
            Err(BackendError::InvalidInput(_)) => {}
            other => panic!("unexpected result after crash: {:?}", other),
        }
        assert!(Instant::now() < deadline, "killed service still reported as connected");
        thread::sleep(Duration::from_millis(10));
    }
    assert!(backend.supervisor().child_id().is_none());
}

// Fixed secret keys (little-endian scalars) and the bytes both backends
// must produce for them over `MESSAGE`.
const KAT_SECRET_KEYS: [&str; 3] = [
    "0102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f20",
    "1111111111111111111111111111111111111111111111111111111111111111",
    "4242424242424242424242424242424242424242424242424242424242424242",
];
const KAT_PUBLIC_KEYS: [&str; 3] = [
    "954087aafacc1046c0f0ad35d5b60163cb4771573f995afdd6f26cbeec117caaef1a94eed091f06cfbb04cd44819a4b419629b06ca5701c0c4a53b370db40a5adf174a8627ff0fe765eddfb0e4bb5debddcb7a268afec33c833f7f9466fded0c",
    "a55ee687dbc4afab98c79deea7583de9742d19d36d33fcfba05f39adee8de27b6f52c2e4ce2a9c60f20bd480bb73a560125c0b088433c8fcee5f722f56f40d76873e4f25a1e69ae001b3ae6418e47a7bbb47228cb64fe55ced244976b98d32fb",
    "922c13c92a1dde7f0493b5c7928795d09d017d7b60338d6bee2ab20d74734e843ed89629de326ca89cdb12effb00b62a1138c6dba517c42b16032225122933249689d482aee73bfc7619fe3b26ec72510d234feef0b78dcb82e1e64f83a4a53a",
];
const KAT_SIGNATURES: [&str; 3] = [
    "a4f618fc6f4a2f68c0b86c7b623eee5bcc9d0393dc1a80838402078acdfc6a521e0773f1e4f24ec83e5f89467477972b",
    "87cb9be3d0ee53b15d73ceb44cb88c970f552f8b29f02ee305198fb997a711e256f2d93fd96a8fd0468a9c4cc31e3cf1",
    "abf00a8455b285fdd57514aea314acb9d66ed09fb5e694422748c6d1dd8a88a57ab707abfe60c69680abb07166a41daf",
];
const KAT_APK: &str = "86bbe5f5bfc7e25f482ef7d61e3249a2f52f6002b93b1e9a403a2859b9855772efa93e9f1fa26eb085579e9c7222c31518776a5b76ba46111f0dcef00285844ad73ed58d1f2962ae19644277aad9e7c0a68b7623c7996354370f1eb312e7240e";
const KAT_AGGREGATE_PK: &str = "96202406ed9353df09b7d1180e645d7296d545db0e956fd390bfd8a788fd51f36b5ac6641efa51de98700273d0e78b6319a62b36e421df097c1559ab0e20479e757fb03e10e8f1010f674f0966d82784cbebe6159687c3891519db5e4647e1aa";
const KAT_AGGREGATE_SIG: &str = "8c83081a31034a127987147afd723b87807f2886e7755fcf6dcdf1b49c7dfc606dfb8a320c7a5136385e9e98700d2809";

fn check_known_answers(backend: &dyn Backend) {
    let sks: Vec<Vec<u8>> = KAT_SECRET_KEYS
        .iter()
        .map(|sk| hex::decode(sk).unwrap())
        .collect();
    let pks: Vec<Vec<u8>> = KAT_PUBLIC_KEYS
        .iter()
        .map(|pk| hex::decode(pk).unwrap())
        .collect();

    let sigs: Vec<Vec<u8>> = sks
        .iter()
        .zip(&pks)
        .map(|(sk, pk)| backend.sign(sk, pk, MESSAGE).unwrap())
        .collect();
    for (sig, expected) in sigs.iter().zip(KAT_SIGNATURES) {
        assert_eq!(hex::encode(sig), expected, "{} sign", backend.name());
    }

    let apk = backend.create_apk(&pks[0]).unwrap();
    assert_eq!(hex::encode(&apk), KAT_APK, "{} create_apk", backend.name());

    let rest: Vec<&[u8]> = pks[1..].iter().map(Vec::as_slice).collect();
    let agg_pk = backend.aggregate_pk(&apk, &rest).unwrap();
    assert_eq!(hex::encode(&agg_pk), KAT_AGGREGATE_PK, "{} aggregate_pk", backend.name());

    let rest: Vec<&[u8]> = sigs[1..].iter().map(Vec::as_slice).collect();
    let agg_sig = backend.aggregate_sig(&sigs[0], &rest).unwrap();
    assert_eq!(hex::encode(&agg_sig), KAT_AGGREGATE_SIG, "{} aggregate_sig", backend.name());

    assert_eq!(backend.verify(&agg_pk, &agg_sig, MESSAGE), Ok(()));
}

#[test]
fn test_known_answers_on_both_backends() {
    check_known_answers(&LocalBackend::new());

    let temp_dir = TempDir::new().unwrap();
    let backend = remote(&temp_dir);
    backend.connect().unwrap();
    check_known_answers(&backend);
    backend.disconnect().unwrap();
}
