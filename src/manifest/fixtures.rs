//! Trimmed-down deployment manifests shared by tests

pub const CF_MANIFEST: &str = r#"name: cf-0f4a1b2c3d4e5f607182
stemcells:
- alias: ubuntu-xenial
  os: ubuntu-xenial
  version: "250.17"
variables:
- name: autoscale-db-credentials
  type: password
- name: /cf/diego-instance-identity-root-ca
  type: certificate
  options:
    is_ca: true
    common_name: Diego Instance Identity Root CA
- name: diego-instance-identity-intermediate-ca-2018
  type: certificate
  ca: /cf/diego-instance-identity-root-ca
  options:
    is_ca: true
    ca: /cf/diego-instance-identity-root-ca
    common_name: Diego Instance Identity Intermediate CA
instance_groups:
- name: router
  jobs:
  - name: gorouter
    properties:
      router:
        ca_certs: ((diego-instance-identity-root-ca.certificate))
- name: credhub
  jobs:
  - name: credhub
    properties:
      credhub:
        authentication:
          mutual_tls:
            trusted_cas:
            - ((diego-instance-identity-root-ca.certificate))
- name: diego_cell
  jobs:
  - name: rep
    properties:
      containers:
        trusted_ca_certificates:
        - ((diego-instance-identity-root-ca.certificate))
      diego:
        executor:
          instance_identity_ca_cert: ((diego-instance-identity-intermediate-ca-2018.certificate))
          instance_identity_key: ((diego-instance-identity-intermediate-ca-2018.private_key))
  - name: cflinuxfs3-rootfs-setup
    properties:
      cflinuxfs3-rootfs:
        trusted_certs:
        - ((diego-instance-identity-root-ca.certificate))
- name: diego_brain
  jobs:
  - name: ssh_proxy
    properties:
      backends:
        tls:
          enabled: true
          ca_certificates:
          - ((diego-instance-identity-root-ca.certificate))
      diego:
        ssh_proxy:
          bbs:
            ca_cert: ((diego-instance-identity-root-ca.certificate))
"#;

pub const ISO_MANIFEST: &str = r#"name: p-isolation-segment-iso1-pub-065aba009c17a59d5cc9
variables:
- name: diego-instance-identity-intermediate-ca-2018
  type: certificate
  ca: /cf/diego-instance-identity-root-ca
  options:
    is_ca: true
    ca: /cf/diego-instance-identity-root-ca
    common_name: Diego Instance Identity Intermediate CA
instance_groups:
- name: isolated_router_iso1_pub
  jobs:
  - name: gorouter
    properties:
      router:
        ca_certs: ((/cf/diego-instance-identity-root-ca.certificate))
- name: isolated_diego_cell_iso1_pub
  jobs:
  - name: rep
    properties:
      containers:
        trusted_ca_certificates:
        - ((/cf/diego-instance-identity-root-ca.certificate))
      diego:
        executor:
          instance_identity_ca_cert: ((diego-instance-identity-intermediate-ca-2018.certificate))
          instance_identity_key: ((diego-instance-identity-intermediate-ca-2018.private_key))
  - name: cflinuxfs3-rootfs-setup
    properties:
      cflinuxfs3-rootfs:
        trusted_certs: ((/cf/diego-instance-identity-root-ca.certificate))
"#;

pub const WINDOWS_MANIFEST: &str = r#"name: pas-windows-065aba009c17a59d5cc9
variables:
- name: diego-instance-identity-intermediate-ca-2018
  type: certificate
  ca: /cf/diego-instance-identity-root-ca
  options:
    is_ca: true
    ca: /cf/diego-instance-identity-root-ca
    common_name: Diego Instance Identity Intermediate CA
instance_groups:
- name: windows_diego_cell
  jobs:
  - name: rep_windows
    properties:
      containers:
        trusted_ca_certificates:
        - ((/cf/diego-instance-identity-root-ca.certificate))
      diego:
        executor:
          instance_identity_ca_cert: ((diego-instance-identity-intermediate-ca-2018.certificate))
          instance_identity_key: ((diego-instance-identity-intermediate-ca-2018.private_key))
  - name: windows2019fs
    properties:
      windows-rootfs:
        trusted_certs: ((/cf/diego-instance-identity-root-ca.certificate))
"#;
