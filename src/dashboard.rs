use std::sync::Arc;

use axum::{extract::State, response::Html, routing::get, Router};

use crate::models::{ActionState, StoredObject};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(dashboard_page))
        .route("/fragments/files", get(file_rows))
}

/// Loading the page is a full reload: staged files, the selection and the
/// select-all flag are dropped and the listing is fetched from scratch.
async fn dashboard_page(State(state): State<Arc<AppState>>) -> Html<String> {
    let files = state.manager.reload().await.unwrap_or_else(|e| {
        tracing::error!(error = %e, "Listing failed");
        Vec::new()
    });
    let actions = state.manager.actions();

    Html(render_dashboard(&state.config.data_dir, &files, actions))
}

async fn file_rows(State(state): State<Arc<AppState>>) -> Html<String> {
    let files = state.manager.list_files().await.unwrap_or_else(|e| {
        tracing::error!(error = %e, "Listing failed");
        Vec::new()
    });
    Html(render_rows(&files))
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// One table row per object, in the order given
pub fn render_rows(files: &[StoredObject]) -> String {
    files
        .iter()
        .map(|f| {
            format!(
                r#"<tr>
                    <td><input type="checkbox" data-key="{key}"></td>
                    <td class="date-cell">{date}</td>
                    <td><span class="file-name" data-url="{url}" data-key="{key}">{name}</span></td>
                    <td class="size-cell">{size}</td>
                </tr>"#,
                key = escape_html(&f.full_path),
                date = escape_html(&f.date_label),
                url = escape_html(&f.download_url),
                name = escape_html(&f.name),
                size = f.size_human,
            )
        })
        .collect()
}

fn disabled(enabled: bool) -> &'static str {
    if enabled {
        ""
    } else {
        " disabled"
    }
}

fn render_dashboard(data_dir: &str, files: &[StoredObject], actions: ActionState) -> String {
    format!(
        r##"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>BucketDesk</title>
    <meta name="description" content="BucketDesk: upload, download and delete files in an object storage bucket">
    <style>{style}</style>
</head>
<body>
    <header class="header">
        <span class="logo-text">BucketDesk</span>
        <span class="logo-badge">{data_dir}</span>
    </header>

    <main class="main">
        <div id="upload-area" class="upload-area">
            <p>Drag &amp; drop files here, or click to browse</p>
            <input type="file" id="file-input" multiple style="display:none">
        </div>
        <pre id="file-preview" class="file-preview"></pre>

        <div id="upload-status" class="upload-status" style="display:none;">
            <span id="uploading-file-name"></span>
            <progress id="upload-progress" max="100" value="0"></progress>
        </div>

        <div class="actions">
            <button class="btn btn-secondary" id="select-all-btn">Select all</button>
            <button class="btn btn-primary" id="upload-btn"{upload_disabled}>Upload</button>
            <button class="btn btn-secondary" id="download-btn"{download_disabled}>Download</button>
            <button class="btn btn-danger" id="delete-btn"{delete_disabled}>Delete</button>
        </div>

        <table class="file-table">
            <thead>
                <tr><th></th><th>Uploaded</th><th>Name</th><th>Size</th></tr>
            </thead>
            <tbody id="file-list">{rows}</tbody>
        </table>
    </main>

    <script>{script}</script>
</body>
</html>"##,
        style = STYLE,
        script = SCRIPT,
        data_dir = escape_html(data_dir),
        upload_disabled = disabled(actions.upload_enabled),
        download_disabled = disabled(actions.download_enabled),
        delete_disabled = disabled(actions.delete_enabled),
        rows = render_rows(files),
    )
}

const STYLE: &str = r#"
    :root {
        --bg-primary: #0a0e1a;
        --bg-card: #1a1f35;
        --border-color: #2a3152;
        --text-primary: #e8ecf4;
        --text-secondary: #8892a8;
        --accent-primary: #6366f1;
        --accent-danger: #ef4444;
        --radius-md: 12px;
    }
    * { margin:0; padding:0; box-sizing:border-box; }
    body { font-family: system-ui, sans-serif; background: var(--bg-primary); color: var(--text-primary); }
    .header { display:flex; align-items:center; gap:12px; padding:20px 32px; border-bottom:1px solid var(--border-color); }
    .logo-text { font-weight:700; font-size:1.25rem; }
    .logo-badge { font-size:0.75rem; color: var(--text-secondary); font-family: monospace; }
    .main { max-width: 960px; margin: 0 auto; padding: 32px; }
    .upload-area { border:2px dashed var(--border-color); border-radius: var(--radius-md); padding:40px; text-align:center; cursor:pointer; color: var(--text-secondary); }
    .upload-area.drag-over { border-color: var(--accent-primary); }
    .file-preview { margin:16px 0; color: var(--text-secondary); white-space: pre-wrap; }
    .upload-status { display:flex; gap:12px; align-items:center; margin-bottom:16px; }
    .upload-status progress { flex:1; }
    .actions { display:flex; gap:8px; margin-bottom:16px; }
    .btn { padding:8px 16px; border-radius:8px; border:1px solid var(--border-color); cursor:pointer; color: var(--text-primary); background: var(--bg-card); }
    .btn-primary { background: var(--accent-primary); border-color: var(--accent-primary); }
    .btn-danger { background: var(--accent-danger); border-color: var(--accent-danger); }
    .btn:disabled { opacity:0.4; cursor:not-allowed; }
    .file-table { width:100%; border-collapse: collapse; }
    .file-table th, .file-table td { text-align:left; padding:8px; border-bottom:1px solid var(--border-color); }
    .date-cell, .size-cell { color: var(--text-secondary); font-family: monospace; }
"#;

const SCRIPT: &str = r#"
    const API = '/api';
    const uploadArea = document.getElementById('upload-area');
    const fileInput = document.getElementById('file-input');
    const fileList = document.getElementById('file-list');
    const preview = document.getElementById('file-preview');
    const uploadStatus = document.getElementById('upload-status');
    const uploadingName = document.getElementById('uploading-file-name');
    const uploadProgress = document.getElementById('upload-progress');
    const uploadButton = document.getElementById('upload-btn');
    const downloadButton = document.getElementById('download-btn');
    const deleteButton = document.getElementById('delete-btn');
    const selectAllButton = document.getElementById('select-all-btn');

    function applyActions(actions) {
        uploadButton.disabled = !actions.upload_enabled;
        downloadButton.disabled = !actions.download_enabled;
        deleteButton.disabled = !actions.delete_enabled;
    }

    function triggerDownload(href, filename) {
        const link = document.createElement('a');
        link.href = href;
        link.download = filename;
        link.style.display = 'none';
        document.body.appendChild(link);
        link.click();
        document.body.removeChild(link);
    }

    // ── Staging ─────────────────────────────────────
    async function stageFiles(files) {
        if (files.length === 0) return;
        const form = new FormData();
        for (const file of files) form.append('files', file, file.name);
        const res = await fetch(API + '/staging', { method: 'POST', body: form });
        const body = await res.json();
        if (!res.ok) { console.error('Staging failed:', body.message); return; }
        preview.innerText = body.preview;
        applyActions(body.actions);
    }

    uploadArea.addEventListener('dragover', (e) => {
        e.preventDefault();
        e.stopPropagation();
        e.dataTransfer.dropEffect = 'copy';
        uploadArea.classList.add('drag-over');
    });
    uploadArea.addEventListener('dragleave', () => uploadArea.classList.remove('drag-over'));
    uploadArea.addEventListener('drop', (e) => {
        e.preventDefault();
        e.stopPropagation();
        uploadArea.classList.remove('drag-over');
        stageFiles(Array.from(e.dataTransfer.files));
    });
    uploadArea.addEventListener('click', () => fileInput.click());
    fileInput.addEventListener('change', () => stageFiles(Array.from(fileInput.files)));

    // ── Upload ──────────────────────────────────────
    uploadButton.addEventListener('click', async () => {
        uploadButton.disabled = true;
        uploadStatus.style.display = 'flex';
        const poll = setInterval(async () => {
            const res = await fetch(API + '/upload/progress');
            const progress = await res.json();
            if (progress) {
                uploadingName.textContent = 'Uploading: ' + progress.file_name;
                uploadProgress.value = progress.percent;
            }
        }, 200);

        const res = await fetch(API + '/upload', { method: 'POST' });
        clearInterval(poll);
        uploadingName.textContent = '';
        if (res.ok) {
            location.reload();
        } else {
            const body = await res.json();
            console.error('Upload failed:', body.message);
            uploadStatus.style.display = 'none';
        }
    });

    // ── Selection ───────────────────────────────────
    fileList.addEventListener('change', async (e) => {
        const checkbox = e.target;
        if (checkbox.type !== 'checkbox') return;
        const res = await fetch(API + '/selection', {
            method: 'POST',
            headers: { 'Content-Type': 'application/json' },
            body: JSON.stringify({ key: checkbox.dataset.key, checked: checkbox.checked }),
        });
        applyActions((await res.json()).actions);
    });

    selectAllButton.addEventListener('click', async () => {
        const res = await fetch(API + '/selection/all', { method: 'POST' });
        const body = await res.json();
        for (const checkbox of fileList.querySelectorAll('input[type=checkbox]')) {
            checkbox.checked = body.selected.includes(checkbox.dataset.key);
        }
        applyActions(body.actions);
    });

    // ── Download ────────────────────────────────────
    downloadButton.addEventListener('click', async () => {
        const res = await fetch(API + '/download', { method: 'POST' });
        if (res.status === 400) {
            alert((await res.json()).message);
            return;
        }
        if (!res.ok) {
            console.error('Download failed:', (await res.json()).message);
            return;
        }
        if ((res.headers.get('content-type') || '').includes('application/json')) {
            const body = await res.json();
            triggerDownload(body.url, body.filename);
        } else {
            const blob = await res.blob();
            triggerDownload(URL.createObjectURL(blob), 'files.zip');
        }
    });

    // ── Delete ──────────────────────────────────────
    deleteButton.addEventListener('click', async () => {
        const res = await fetch(API + '/delete', { method: 'POST' });
        const body = await res.json();
        if (!res.ok) { console.error('Delete failed:', body.message); return; }
        for (const failure of body.failed) console.error('Delete failed:', failure.key, failure.message);
        const rows = await fetch('/fragments/files');
        fileList.innerHTML = await rows.text();
        applyActions(body.actions);
    });
"#;
