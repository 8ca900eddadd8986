//! Google APIs formally supported by Forseti
//!
//! Other APIs and versions can still be requested, but are not tested and
//! may break without notice.

/// A formally supported API and where its REST surface lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupportedApi {
    /// API name as used by Google (e.g. "iam")
    pub name: &'static str,
    /// Supported version
    pub version: &'static str,
    /// Root URL of the service, with trailing slash
    pub root_url: &'static str,
    /// Path prefix under the root URL; `{version}` is substituted
    pub service_path: &'static str,
}

impl SupportedApi {
    /// Service path for the given version
    pub fn service_path_for(&self, version: &str) -> String {
        self.service_path.replace("{version}", version)
    }
}

pub const SUPPORTED_APIS: &[SupportedApi] = &[
    SupportedApi {
        name: "admin",
        version: "directory_v1",
        root_url: "https://admin.googleapis.com/",
        service_path: "admin/directory/v1/",
    },
    SupportedApi {
        name: "appengine",
        version: "v1",
        root_url: "https://appengine.googleapis.com/",
        service_path: "{version}/",
    },
    SupportedApi {
        name: "bigquery",
        version: "v2",
        root_url: "https://bigquery.googleapis.com/",
        service_path: "bigquery/{version}/",
    },
    SupportedApi {
        name: "cloudbilling",
        version: "v1",
        root_url: "https://cloudbilling.googleapis.com/",
        service_path: "{version}/",
    },
    SupportedApi {
        name: "cloudresourcemanager",
        version: "v1",
        root_url: "https://cloudresourcemanager.googleapis.com/",
        service_path: "{version}/",
    },
    SupportedApi {
        name: "compute",
        version: "v1",
        root_url: "https://compute.googleapis.com/",
        service_path: "compute/{version}/",
    },
    SupportedApi {
        name: "iam",
        version: "v1",
        root_url: "https://iam.googleapis.com/",
        service_path: "{version}/",
    },
    SupportedApi {
        name: "pubsub",
        version: "v1",
        root_url: "https://pubsub.googleapis.com/",
        service_path: "{version}/",
    },
    SupportedApi {
        name: "servicemanagement",
        version: "v1",
        root_url: "https://servicemanagement.googleapis.com/",
        service_path: "{version}/",
    },
    SupportedApi {
        name: "sqladmin",
        version: "v1beta4",
        root_url: "https://sqladmin.googleapis.com/",
        service_path: "sql/{version}/",
    },
    SupportedApi {
        name: "storage",
        version: "v1",
        root_url: "https://storage.googleapis.com/",
        service_path: "storage/{version}/",
    },
];

/// Look up a supported API by name
pub fn lookup(name: &str) -> Option<&'static SupportedApi> {
    SUPPORTED_APIS.iter().find(|api| api.name == name)
}
