//! Built-in source, sink, and sanitizer pattern sets.

/// JavaScript/TypeScript sources: web request data and browser inputs.
pub const JS_SOURCES: &[&str] = &[
    "req.body",
    "req.query",
    "req.params",
    "req.headers",
    "req.cookies",
    "request.body",
    "request.query",
    "request.params",
    "ctx.request.body",
    "ctx.query",
    "ctx.params",
    "document.location",
    "window.location",
    "document.URL",
    "document.referrer",
    "localStorage.getItem",
    "sessionStorage.getItem",
    "URLSearchParams",
    "postMessage",
];

/// Python sources: web and CLI input.
pub const PYTHON_SOURCES: &[&str] = &[
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
    "input",
    "sys.argv",
    "click.argument",
    "click.option",
    "argparse.parse_args",
];

/// Network I/O sources.
pub const NETWORK_SOURCES: &[&str] = &[
    "socket.recv",
    "socket.recvfrom",
    "websocket.receive",
    "stdin.read",
];

/// Web scraping and response-body sources.
pub const WEB_SCRAPING_SOURCES: &[&str] = &[
    "requests.get",
    "requests.post",
    "requests.put",
    "requests.patch",
    "requests.delete",
    "response.text",
    "response.content",
    "response.json",
    "urlopen",
    "urllib.request.urlopen",
    "BeautifulSoup",
    "soup.find",
    "soup.find_all",
    "soup.select",
    "page.content",
    "page.inner_text",
    "page.inner_html",
    "driver.page_source",
    "element.text",
    "element.get_attribute",
    "response.body",
    "response.css",
    "response.xpath",
];

/// File-I/O-as-input sources. External only in a scraping/network context.
pub const FILE_IO_SOURCES: &[&str] = &[
    "open",
    "file.read",
    "file.readline",
    "file.readlines",
    "json.load",
    "json.loads",
    "csv.reader",
    "csv.DictReader",
    "pd.read_csv",
    "pd.read_excel",
    "pd.read_json",
    "yaml.load",
    "yaml.safe_load",
    "etree.parse",
    "etree.fromstring",
    "os.getenv",
    "os.environ.get",
    "environ.get",
];

/// SQL execution sinks.
pub const SQL_SINKS: &[&str] = &[
    "db.query",
    "db.execute",
    "db.exec",
    "db.raw",
    "cursor.execute",
    "connection.execute",
    "execute",
    "executemany",
    "rawQuery",
    "knex.raw",
    "sequelize.query",
    "asyncpg.execute",
    "asyncpg.fetch",
    "asyncpg.fetchrow",
    "databases.execute",
    "databases.fetch_all",
    "prisma.$queryRaw",
    "prisma.$queryRawUnsafe",
    "prisma.$executeRawUnsafe",
    "typeorm.query",
    "objection.raw",
];

/// Command execution sinks.
pub const COMMAND_SINKS: &[&str] = &[
    "os.system",
    "os.popen",
    "subprocess.run",
    "subprocess.call",
    "subprocess.Popen",
    "subprocess.check_call",
    "subprocess.check_output",
    "exec",
    "eval",
    "child_process.exec",
    "child_process.spawn",
    "child_process.execFile",
    "shell.exec",
];

/// HTML/response output sinks.
pub const XSS_SINKS: &[&str] = &[
    "innerHTML",
    "outerHTML",
    "document.write",
    "document.writeln",
    "dangerouslySetInnerHTML",
    "insertAdjacentHTML",
    "response.write",
    "res.send",
    "res.render",
    "res.json",
];

/// File system sinks.
pub const PATH_SINKS: &[&str] = &[
    "fs.readFile",
    "fs.readFileSync",
    "fs.writeFile",
    "fs.writeFileSync",
    "fs.createReadStream",
    "fs.createWriteStream",
    "open",
    "file.open",
    "path.join",
    "os.path.join",
];

/// LDAP sinks.
pub const LDAP_SINKS: &[&str] = &[
    "ldap.search",
    "ldap.bind",
    "ldap.modify",
    "ldap.add",
    "ldap.delete",
];

/// NoSQL sinks.
pub const NOSQL_SINKS: &[&str] = &[
    "$where",
    "$regex",
    "collection.find",
    "collection.findOne",
    "collection.update",
    "collection.remove",
    "collection.aggregate",
];

/// SQL parameterization and escaping helpers.
pub const SQL_SANITIZERS: &[&str] = &[
    "escape_string",
    "mysql_real_escape_string",
    "pg_escape_string",
    "sqlalchemy.text",
    "db.prepare",
    "parameterize",
    "bind_param",
    "psycopg2.sql.SQL",
    "psycopg2.sql.Identifier",
];

/// HTML escapers.
pub const XSS_SANITIZERS: &[&str] = &[
    "escape_html",
    "html.escape",
    "markupsafe.escape",
    "DOMPurify.sanitize",
    "bleach.clean",
    "strip_tags",
    "sanitize_html",
    "JSON.stringify",
    "encodeURIComponent",
    "encodeURI",
    "escapeHtml",
    "htmlspecialchars",
    "htmlentities",
];

/// Filename and path securers.
pub const PATH_SANITIZERS: &[&str] = &[
    "os.path.basename",
    "secure_filename",
    "sanitize_filename",
    "normalize_path",
    "realpath",
    "path.resolve",
    "path.normalize",
    "werkzeug.utils.secure_filename",
];

/// Shell argument quoters.
pub const COMMAND_SANITIZERS: &[&str] = &[
    "shlex.quote",
    "pipes.quote",
    "escapeshellarg",
    "escapeshellcmd",
    "shell_escape",
    "quote",
];

/// Generic validator name stems.
pub const VALIDATION_SANITIZERS: &[&str] = &[
    "validate",
    "validator",
    "is_valid",
    "check_input",
    "sanitize",
    "clean",
    "filter_var",
    "verify",
];
