//! Framework-specific pattern additions.

use crate::types::PatternMap;

/// Frameworks the registry knows how to enrich for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Framework {
    Flask,
    Django,
    FastApi,
    Express,
    Koa,
    Fastify,
}

impl Framework {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Flask => "flask",
            Self::Django => "django",
            Self::FastApi => "fastapi",
            Self::Express => "express",
            Self::Koa => "koa",
            Self::Fastify => "fastify",
        }
    }

    /// Parse a detected framework name, case-insensitive.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "flask" => Some(Self::Flask),
            "django" => Some(Self::Django),
            "fastapi" => Some(Self::FastApi),
            "express" => Some(Self::Express),
            "koa" => Some(Self::Koa),
            "fastify" => Some(Self::Fastify),
            _ => None,
        }
    }
}

const DJANGO_SOURCES: &[&str] = &[
    "request.GET",
    "request.POST",
    "request.FILES",
    "request.META",
    "request.session",
    "request.COOKIES",
    "request.user",
    "request.path",
    "request.path_info",
    "request.method",
];

const FLASK_SOURCES: &[&str] = &[
    "request.args",
    "request.form",
    "request.json",
    "request.data",
    "request.values",
    "request.files",
    "request.cookies",
    "request.headers",
    "request.get_json",
    "request.get_data",
    "request.environ",
    "request.view_args",
];

const FASTAPI_SOURCES: &[&str] = &[
    "request.url",
    "request.headers",
    "request.cookies",
    "request.query_params",
    "request.path_params",
    "request.client",
    "request.session",
    "request.state",
    "Query(",
    "Path(",
    "Body(",
    "Header(",
    "Cookie(",
    "Form(",
    "File(",
    "UploadFile(",
    "Depends(",
];

const NODE_SOURCES: &[&str] = &[
    "req.body",
    "req.query",
    "req.params",
    "req.headers",
    "req.cookies",
    "req.ip",
    "req.hostname",
    "req.path",
    "req.url",
];

const NODE_XSS_SINKS: &[&str] = &[
    "res.status().json",
    "res.status().send",
    "res.status().jsonp",
    "res.status().end",
    "res.redirect",
    "res.cookie",
    "res.header",
    "res.set",
    "res.jsonp",
    "res.sendFile",
    "res.download",
    "res.sendStatus",
    "res.format",
    "res.attachment",
    "res.append",
    "res.location",
];

const NODE_SQL_SINKS: &[&str] = &[
    "models.sequelize.query",
    "sequelize.query",
    "knex.raw",
    "db.raw",
    "db.query",
    "pool.query",
    "client.query",
];

const NODE_PATH_SINKS: &[&str] = &[
    "res.sendFile",
    "res.download",
    "fs.promises.readFile",
    "fs.promises.writeFile",
    "fs.promises.unlink",
    "fs.promises.rmdir",
    "fs.promises.mkdir",
    "require",
];

fn extend_unique(map: &mut PatternMap, category: &str, patterns: &[&str]) {
    let entry = map.entry(category.to_string()).or_default();
    for pattern in patterns {
        if !entry.iter().any(|p| p == pattern) {
            entry.push((*pattern).to_string());
        }
    }
}

/// Add one framework's patterns to mutable clones of the pattern maps.
/// Python frameworks contribute sources only; Node frameworks also add
/// response-method and raw-query sinks.
pub fn apply_framework(framework: Framework, sources: &mut PatternMap, sinks: &mut PatternMap) {
    match framework {
        Framework::Django => extend_unique(sources, "python", DJANGO_SOURCES),
        Framework::Flask => extend_unique(sources, "python", FLASK_SOURCES),
        Framework::FastApi => extend_unique(sources, "python", FASTAPI_SOURCES),
        Framework::Express | Framework::Koa | Framework::Fastify => {
            extend_unique(sources, "js", NODE_SOURCES);
            extend_unique(sinks, "xss", NODE_XSS_SINKS);
            extend_unique(sinks, "sql", NODE_SQL_SINKS);
            extend_unique(sinks, "path", NODE_PATH_SINKS);
        }
    }
}
