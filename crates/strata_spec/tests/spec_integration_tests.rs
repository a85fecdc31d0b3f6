//! Integration tests for environment loading.

use std::fs;
use tempfile::tempdir;

use strata_spec::{
    EnvironmentReader, EnvironmentValidator, EnvironmentWriter, IpSource, SpecError,
};

const ENVIRONMENT: &str = r#"
vpc:
  - name: platform
    region: eu-central-1
    account: 123456789012
    cidr: 10.40.0.0/16
  - name: platform
    region: us-east-1
    account: 123456789012
    cidr: 10.41.0.0/16
ec2:
  - name: api
    env_name: staging
    region: eu-central-1
    account: 123456789012
    type: m6i.large
    ami: al2023-ami-2023.4
    device_name: /dev/xvda
    key_name: deploy
    vpc_id: vpc-0123456789abcdef0
    is_public: false
    script: api.sh
    allowed_ports:
      - http:
          - port: 8080
            ip: 10.40.0.0/16
      - ssh:
          - port: "22"
            ip: any
db:
  - name: ledger
    id: fin
    subnet_ids:
      - subnet-111
      - subnet-222
    account: 123456789012
    region: eu-central-1
    engine: aurora
    instance_type: r6g.large
    storage: 100
    username: LEDGER_DB_USER
    password: LEDGER_DB_PASS
    vpc_id: vpc-0123456789abcdef0
    allowed_ports: []
    multi_az: true
    port: 3306
"#;

/// Load from disk, validate, write back and reload.
#[test]
fn test_environment_full_workflow() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("environment.yaml");
    fs::write(&path, ENVIRONMENT).unwrap();

    let spec = EnvironmentReader::load(&path).unwrap();
    assert_eq!(spec.record_count(), 4);

    // Same name in two regions is not a duplicate.
    let result = EnvironmentValidator::validate(&spec);
    assert!(result.valid, "Validation failed: {:?}", result.errors);

    // Unknown engine is a warning only.
    assert!(result.warnings.iter().any(|w| w.contains("aurora")));

    let api = &spec.ec2[0];
    assert_eq!(api.allowed_ports.len(), 2);
    assert_eq!(api.allowed_ports[1].port, 22);
    assert_eq!(api.allowed_ports[1].source, IpSource::Any);

    let copy = temp.path().join("copy.yaml");
    EnvironmentWriter::write(&copy, &spec).unwrap();
    let reloaded = EnvironmentReader::load(&copy).unwrap();
    assert_eq!(spec, reloaded);
}

#[test]
fn test_missing_file() {
    let temp = tempdir().unwrap();
    let err = EnvironmentReader::load(temp.path().join("nope.yaml")).unwrap_err();
    assert!(matches!(err, SpecError::NotFound(_)));
}

#[test]
fn test_malformed_document_reports_path() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("environment.yaml");
    fs::write(&path, "ec2:\n  - name: [unterminated\n").unwrap();

    let err = EnvironmentReader::load(&path).unwrap_err();
    match err {
        SpecError::InvalidFormat { path: reported, .. } => assert_eq!(reported, path),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_malformed_rule_fails_at_load() {
    let yaml = ENVIRONMENT.replace("            ip: 10.40.0.0/16\n", "");
    let err = EnvironmentReader::from_str(&yaml).unwrap_err();
    assert!(matches!(err, SpecError::Yaml(_)));
}

#[test]
fn test_out_of_range_port_fails_at_load() {
    let yaml = ENVIRONMENT.replace("port: 3306", "port: 70000");
    assert!(EnvironmentReader::from_str(&yaml).is_err());
}
