use chrono::{Datelike, NaiveDate};
use maud::{html, Markup, PreEscaped, DOCTYPE};

use crate::calendar::{self, MonthView, WEEKDAYS};
use crate::render;
use crate::types::{Entry, Section, SpecialKind};

/// Background tints cycled across field cards
const TINTS: [&str; 5] = ["tint-mint", "tint-lavender", "tint-pink", "tint-peach", "tint-yellow"];

fn page_href(section: Section, month: NaiveDate) -> String {
    format!(
        "/?section={}&month={}",
        section.as_str(),
        calendar::month_param(month)
    )
}

pub fn render_page(section: Section, month: &MonthView) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { "CampusDocx" }
                style { (PreEscaped(CSS)) }
            }
            body.(section.as_str()) {
                header.topbar {
                    div.brand {
                        h1 { "CampusDocx" }
                        p.tagline { "Answering the biggest problem of the era: Bhai Aaj Kya Hua?" }
                    }
                    div.actions {
                        @let kind = section.special();
                        button.flat-button.special type="button" data-special=(kind.as_str()) {
                            (kind.title())
                        }
                        button.flat-button #"admin-toggle" type="button" { "Admin Login" }
                    }
                }
                main.container {
                    nav.tabs {
                        @for tab in Section::ALL {
                            a.tab.active[tab == section] href=(page_href(tab, month.first)) {
                                (tab.title())
                            }
                        }
                    }
                    div.month-nav {
                        @if let Some(prev) = month.prev {
                            a.nav-button href=(page_href(section, prev)) aria-label="Previous month" { "‹" }
                        } @else {
                            span.nav-button.disabled { "‹" }
                        }
                        h2.month-title { (month.title()) }
                        a.nav-button href=(page_href(section, month.next)) aria-label="Next month" { "›" }
                    }
                    div.weekdays {
                        @for name in WEEKDAYS {
                            div { (name) }
                        }
                    }
                    div.calendar-grid {
                        @for day in &month.days {
                            @if day.clickable {
                                button.day.today[day.is_today]
                                    type="button"
                                    data-section=(section.as_str())
                                    data-date=(day.date.format("%Y-%m-%d").to_string()) {
                                    (day.date.day())
                                }
                            } @else {
                                div.day.locked.outside[!day.in_month] { (day.date.day()) }
                            }
                        }
                    }
                }
                div.modal-host #"modal-host" {}
                (login_modal())
                script { (PreEscaped(JAVASCRIPT)) }
            }
        }
    }
}

fn login_modal() -> Markup {
    html! {
        div.login-backdrop #"login-modal" hidden {
            form.login-card #"login-form" {
                h3 { "Admin Login" }
                label for="login-username" { "Username" }
                input #"login-username" name="username" type="text" autocomplete="username" required;
                label for="login-password" { "Password" }
                input #"login-password" name="password" type="password" autocomplete="current-password" required;
                p.login-error #"login-error" {}
                div.login-actions {
                    button.flat-button type="button" data-login-cancel="true" { "Cancel" }
                    button.flat-button.primary type="submit" { "Login" }
                }
            }
        }
    }
}

fn modal_header(title: &str) -> Markup {
    html! {
        div.modal-header {
            h3 { (title) }
            button.close-button type="button" data-close="true" aria-label="Close" { "×" }
        }
    }
}

fn read_only_content(text: &str, holiday_aware: bool) -> Markup {
    html! {
        @if text.trim().is_empty() {
            p.placeholder { "Nothing written yet." }
        } @else {
            (render::render_field(text, holiday_aware))
        }
    }
}

/// Modal body for one day of a section.
/// In edit mode every field is a textarea that the page script auto-saves.
pub fn render_day_modal(section: Section, date: NaiveDate, entry: &Entry, edit: bool) -> Markup {
    let title = format!("{} - {}", section.title(), calendar::long_date(date));
    let holiday_aware = section == Section::School;

    html! {
        div.modal.(section.as_str()) role="dialog" aria-modal="true" {
            (modal_header(&title))
            @if edit {
                @if holiday_aware && !entry.is_holiday() {
                    div.holiday-prompt {
                        span { "Was today a holiday?" }
                        button.flat-button type="button" data-holiday="yes" { "Yes" }
                        button.flat-button type="button" data-holiday="no" { "No" }
                    }
                }
                form.modal-body
                    data-endpoint={ "/api/" (section.as_str()) }
                    data-key-name=(entry.table.key)
                    data-key-value=(entry.key) {
                    @for (idx, (field, value)) in entry.fields().enumerate() {
                        div.field-card.(TINTS[idx % TINTS.len()]) {
                            label for=(field.name) { (field.label) }
                            textarea id=(field.name) name=(field.name) rows="3"
                                placeholder={ "Write something for " (field.name) "..." } {
                                (value)
                            }
                        }
                    }
                    p.save-status aria-live="polite" {}
                }
            } @else {
                div.modal-body {
                    @for (idx, (field, value)) in entry.fields().enumerate() {
                        div.field-card.(TINTS[idx % TINTS.len()]) {
                            div.field-label { (field.label) }
                            div.field-content { (read_only_content(value, holiday_aware)) }
                        }
                    }
                }
            }
        }
    }
}

/// Modal body for a special text blob
pub fn render_special_modal(kind: SpecialKind, entry: &Entry, edit: bool) -> Markup {
    let content = entry.get("content").unwrap_or("");

    html! {
        div.modal.special role="dialog" aria-modal="true" {
            (modal_header(kind.title()))
            @if edit {
                form.modal-body
                    data-endpoint="/api/special"
                    data-key-name=(entry.table.key)
                    data-key-value=(kind.as_str()) {
                    div.field-card.tint-lavender {
                        textarea id="content" name="content" rows="16"
                            placeholder="# Heading, - [ ] task, {https://…/image.png}, links…" {
                            (content)
                        }
                    }
                    p.save-status aria-live="polite" {}
                }
            } @else {
                div.modal-body {
                    div.field-card.tint-lavender {
                        div.field-content { (read_only_content(content, false)) }
                    }
                }
            }
        }
    }
}

const CSS: &str = r#"
:root {
    --mint: #cdeccd;
    --lavender: #e2d9f3;
    --pink: #f9d5e5;
    --peach: #fde2c8;
    --yellow: #fdf5c9;
    --ink: #1f2933;
    --muted: #8a94a6;
}

* {
    margin: 0;
    padding: 0;
    box-sizing: border-box;
}

body {
    font-family: 'Inter', -apple-system, BlinkMacSystemFont, sans-serif;
    color: var(--ink);
    min-height: 100vh;
    line-height: 1.4;
    transition: background-color 0.3s;
}

body.school { background: #eef8ef; }
body.whatidid { background: #f3eefb; }

.topbar {
    position: sticky;
    top: 0;
    z-index: 40;
    display: flex;
    justify-content: space-between;
    align-items: center;
    gap: 16px;
    padding: 20px 32px;
    background: #fff;
    border-bottom: 1px solid #e5e7eb;
}

.topbar h1 {
    font-weight: 400;
    font-size: 1.9em;
}

.tagline {
    color: var(--muted);
    font-size: 0.85em;
    margin-top: 4px;
}

.actions {
    display: flex;
    gap: 10px;
    flex-wrap: wrap;
}

.flat-button {
    border: none;
    border-radius: 10px;
    padding: 8px 16px;
    font: inherit;
    cursor: pointer;
    background: #f1f5f9;
    transition: background 0.2s;
}

.flat-button:hover { background: #e2e8f0; }
.flat-button.special { background: var(--peach); }
.flat-button.primary { background: var(--mint); }
#admin-toggle.is-admin { background: #fecaca; }

.container {
    max-width: 900px;
    margin: 0 auto;
    padding: 32px 24px 60px;
}

.tabs {
    display: flex;
    gap: 8px;
    margin-bottom: 24px;
}

.tab {
    flex: 1;
    text-align: center;
    padding: 10px;
    border-radius: 12px;
    text-decoration: none;
    color: var(--ink);
    background: rgba(255,255,255,0.6);
}

.tab.active { background: #fff; box-shadow: 0 2px 8px rgba(0,0,0,0.08); font-weight: 600; }

.month-nav {
    display: flex;
    justify-content: space-between;
    align-items: center;
    margin-bottom: 16px;
}

.nav-button {
    width: 40px;
    height: 40px;
    display: flex;
    align-items: center;
    justify-content: center;
    border-radius: 50%;
    background: #fff;
    color: var(--ink);
    text-decoration: none;
    font-size: 1.4em;
}

.nav-button.disabled { opacity: 0.3; }

.weekdays, .calendar-grid {
    display: grid;
    grid-template-columns: repeat(7, 1fr);
    gap: 8px;
}

.weekdays div {
    text-align: center;
    color: var(--muted);
    padding: 8px 0;
}

.day {
    aspect-ratio: 1;
    border: none;
    border-radius: 14px;
    font: inherit;
    display: flex;
    align-items: center;
    justify-content: center;
    background: #fff;
}

button.day { cursor: pointer; transition: transform 0.15s; }
button.day:hover { transform: scale(1.05); }
body.school button.day:hover { background: var(--mint); }
body.whatidid button.day:hover { background: var(--lavender); }
.day.today { outline: 2px solid #60a5fa; }
.day.locked { color: #c0c6d0; background: rgba(255,255,255,0.5); }
.day.outside { opacity: 0.4; }

.modal-host {
    display: none;
    position: fixed;
    inset: 0;
    z-index: 50;
    overflow-y: auto;
    padding: 16px;
    background: rgba(255,255,255,0.96);
    justify-content: center;
    align-items: flex-start;
}

.modal-host.open { display: flex; }

.modal {
    width: 100%;
    max-width: 960px;
    background: #fff;
    border: 1px solid #d1d5db;
    border-radius: 14px;
    box-shadow: 0 10px 30px rgba(0,0,0,0.12);
    overflow: hidden;
}

.modal-header {
    display: flex;
    justify-content: space-between;
    align-items: center;
    padding: 16px 24px;
}

.modal.school .modal-header { background: var(--mint); }
.modal.whatidid .modal-header { background: var(--lavender); }
.modal.special .modal-header { background: var(--peach); }

.close-button {
    width: 32px;
    height: 32px;
    border: none;
    border-radius: 50%;
    background: #e5e7eb;
    font-size: 1.2em;
    cursor: pointer;
}

.close-button:hover { background: #ef4444; color: #fff; }

.modal-body { padding: 24px; }

.field-card {
    border-radius: 16px;
    padding: 18px;
    margin-bottom: 16px;
    border: 1px solid rgba(255,255,255,0.5);
}

.tint-mint { background: rgba(205,236,205,0.3); }
.tint-lavender { background: rgba(226,217,243,0.3); }
.tint-pink { background: rgba(249,213,229,0.3); }
.tint-peach { background: rgba(253,226,200,0.3); }
.tint-yellow { background: rgba(253,245,201,0.3); }

.field-card label, .field-label {
    display: block;
    font-size: 0.85em;
    font-weight: 600;
    margin-bottom: 10px;
}

.field-card textarea {
    width: 100%;
    resize: vertical;
    font: inherit;
    font-size: 0.9em;
    padding: 8px 12px;
    border: 1px solid #d1d5db;
    border-radius: 8px;
}

.save-status { color: var(--muted); font-size: 0.8em; min-height: 1em; }

.holiday-prompt {
    display: flex;
    gap: 12px;
    align-items: center;
    justify-content: center;
    padding: 12px 24px;
    background: var(--yellow);
}

.placeholder { color: var(--muted); font-style: italic; font-size: 0.9em; }
.holiday-banner { text-align: center; font-size: 1.1em; padding: 20px 0; }

.rendered { font-size: 0.9em; word-break: break-word; }
.md-blank { height: 0.8em; }
.md-line { margin-bottom: 6px; }
.md-line a { color: #2563eb; text-decoration: underline; }
.md-task input { margin-right: 8px; }
.md-task.done span { text-decoration: line-through; color: #6b7280; }
h1.md-heading { font-size: 1.25em; margin-top: 18px; }
h2.md-heading { font-size: 1.1em; margin-top: 14px; }
h3.md-heading { font-size: 1em; margin-top: 10px; }
.md-image { display: block; max-height: 240px; margin: 10px 0; border-radius: 12px; }

.login-backdrop {
    position: fixed;
    inset: 0;
    z-index: 60;
    display: flex;
    align-items: center;
    justify-content: center;
    background: rgba(15,23,42,0.35);
}

.login-backdrop[hidden] { display: none; }

.login-card {
    width: 320px;
    background: #fff;
    border-radius: 16px;
    padding: 24px;
    display: flex;
    flex-direction: column;
    gap: 8px;
}

.login-card input {
    font: inherit;
    padding: 8px 10px;
    border: 1px solid #d1d5db;
    border-radius: 8px;
}

.login-error { color: #dc2626; font-size: 0.85em; min-height: 1em; }
.login-actions { display: flex; justify-content: flex-end; gap: 8px; }

@media (max-width: 640px) {
    .topbar { flex-direction: column; align-items: flex-start; padding: 16px; }
    .calendar-grid, .weekdays { gap: 4px; }
}
"#;

const JAVASCRIPT: &str = r#"
const ADMIN_KEY = 'campusdocx-admin';
const SAVE_DELAY_MS = 400;
const host = document.getElementById('modal-host');
const adminToggle = document.getElementById('admin-toggle');
const loginModal = document.getElementById('login-modal');
const loginForm = document.getElementById('login-form');
const loginError = document.getElementById('login-error');

let saveTimer = null;
let pendingForm = null;

function isAdmin() {
    return sessionStorage.getItem(ADMIN_KEY) === '1';
}

function syncAdminButton() {
    adminToggle.textContent = isAdmin() ? 'Logout' : 'Admin Login';
    adminToggle.classList.toggle('is-admin', isAdmin());
}

async function openModal(url) {
    const sep = url.includes('?') ? '&' : '?';
    try {
        const res = await fetch(`${url}${sep}edit=${isAdmin()}`);
        if (!res.ok) throw new Error(`HTTP ${res.status}`);
        host.innerHTML = await res.text();
    } catch (err) {
        host.innerHTML = `<div class="modal"><div class="modal-header"><h3>Could not load</h3>` +
            `<button class="close-button" type="button" data-close="true">×</button></div></div>`;
    }
    host.classList.add('open');
    wireModal();
}

function closeModal() {
    flushSave();
    host.classList.remove('open');
    host.innerHTML = '';
}

function payload(form) {
    const data = { [form.dataset.keyName]: form.dataset.keyValue };
    form.querySelectorAll('textarea[name]').forEach(t => { data[t.name] = t.value; });
    return data;
}

function setStatus(form, text) {
    const status = form.querySelector('.save-status');
    if (status) status.textContent = text;
}

// Local state is already updated by the textarea itself; the POST follows.
function scheduleSave(form) {
    pendingForm = form;
    setStatus(form, 'Saving…');
    clearTimeout(saveTimer);
    saveTimer = setTimeout(() => saveNow(form), SAVE_DELAY_MS);
}

function flushSave() {
    if (pendingForm) {
        clearTimeout(saveTimer);
        saveNow(pendingForm);
    }
}

async function saveNow(form) {
    pendingForm = null;
    try {
        const res = await fetch(form.dataset.endpoint, {
            method: 'POST',
            headers: { 'Content-Type': 'application/json' },
            body: JSON.stringify(payload(form)),
        });
        if (!res.ok) throw new Error(`HTTP ${res.status}`);
        setStatus(form, 'Saved');
    } catch (err) {
        setStatus(form, `Save failed: ${err.message}`);
    }
}

function wireModal() {
    const form = host.querySelector('form[data-endpoint]');
    if (!form) return;
    form.addEventListener('input', () => scheduleSave(form));

    const prompt = host.querySelector('.holiday-prompt');
    if (prompt) {
        prompt.querySelector('[data-holiday="yes"]').addEventListener('click', () => {
            const first = form.querySelector('textarea[name="p1"]');
            if (first) first.value = '__IS_HOLIDAY__';
            prompt.remove();
            saveNow(form);
        });
        prompt.querySelector('[data-holiday="no"]').addEventListener('click', () => prompt.remove());
    }
}

host.addEventListener('click', (event) => {
    if (event.target === host || event.target.closest('[data-close]')) closeModal();
});

document.addEventListener('keydown', (event) => {
    if (event.key !== 'Escape') return;
    if (!loginModal.hidden) loginModal.hidden = true;
    else if (host.classList.contains('open')) closeModal();
});

document.querySelectorAll('button.day[data-date]').forEach(button => {
    button.addEventListener('click', () =>
        openModal(`/view/day/${button.dataset.section}/${button.dataset.date}`));
});

document.querySelectorAll('[data-special]').forEach(button => {
    button.addEventListener('click', () => openModal(`/view/special/${button.dataset.special}`));
});

adminToggle.addEventListener('click', () => {
    if (isAdmin()) {
        sessionStorage.removeItem(ADMIN_KEY);
        syncAdminButton();
    } else {
        loginError.textContent = '';
        loginModal.hidden = false;
        document.getElementById('login-username').focus();
    }
});

loginModal.querySelector('[data-login-cancel]').addEventListener('click', () => {
    loginModal.hidden = true;
});

loginForm.addEventListener('submit', async (event) => {
    event.preventDefault();
    const body = {
        username: loginForm.elements.username.value,
        password: loginForm.elements.password.value,
    };
    try {
        const res = await fetch('/api/auth/login', {
            method: 'POST',
            headers: { 'Content-Type': 'application/json' },
            body: JSON.stringify(body),
        });
        if (!res.ok) {
            loginError.textContent = res.status === 401 ? 'Invalid credentials' : 'Login failed';
            return;
        }
        sessionStorage.setItem(ADMIN_KEY, '1');
        loginForm.reset();
        loginModal.hidden = true;
        syncAdminButton();
    } catch (err) {
        loginError.textContent = 'Login failed';
    }
});

syncAdminButton();
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SCHOOL, SPECIAL, WHATIDID};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_page_lists_clickable_days_only() {
        let month = MonthView::new(Some(d(2024, 6, 1)), d(2024, 8, 1), d(2024, 6, 23));
        let html = render_page(Section::School, &month).into_string();

        assert!(html.contains("data-date=\"2024-06-23\""));
        assert!(html.contains("data-date=\"2024-06-30\""));
        assert!(!html.contains("data-date=\"2024-06-22\""));
        assert!(!html.contains("data-date=\"2024-07-01\""));
        assert!(html.contains("June 2024"));
    }

    #[test]
    fn test_page_navigation_links() {
        let month = MonthView::new(Some(d(2024, 6, 1)), d(2024, 8, 1), d(2024, 6, 23));
        let html = render_page(Section::Whatidid, &month).into_string();

        assert!(html.contains("href=\"/?section=whatidid&amp;month=2024-07\""));
        assert!(html.contains("nav-button disabled"));
        assert!(html.contains("href=\"/?section=school&amp;month=2024-06\""));
        assert!(html.contains("<body class=\"whatidid\">"));
    }

    #[test]
    fn test_page_has_section_special_button_and_login() {
        let month = MonthView::new(None, d(2024, 8, 1), d(2024, 6, 23));

        let school = render_page(Section::School, &month).into_string();
        assert!(school.contains("data-special=\"holiday_homework\""));
        assert!(!school.contains("data-special=\"what_had_done\""));
        assert!(school.contains("id=\"login-form\""));

        let whatidid = render_page(Section::Whatidid, &month).into_string();
        assert!(whatidid.contains("data-special=\"what_had_done\""));
        assert!(!whatidid.contains("data-special=\"holiday_homework\""));
    }

    #[test]
    fn test_day_modal_read_only() {
        let mut entry = Entry::empty(&SCHOOL, "2024-06-24");
        entry.values[0] = "# Algebra\n- [x] Homework".to_string();

        let html = render_day_modal(Section::School, d(2024, 6, 24), &entry, false).into_string();

        assert!(html.contains("School - Monday, June 24, 2024"));
        assert!(html.contains("P1 - First Period"));
        assert!(html.contains("<h1 class=\"md-heading\">Algebra</h1>"));
        assert!(html.contains("Nothing written yet."));
        assert!(!html.contains("<textarea"));
    }

    #[test]
    fn test_day_modal_edit_mode() {
        let mut entry = Entry::empty(&WHATIDID, "2024-06-24");
        entry.values[1] = "Optics <revision>".to_string();

        let html =
            render_day_modal(Section::Whatidid, d(2024, 6, 24), &entry, true).into_string();

        assert!(html.contains("data-endpoint=\"/api/whatidid\""));
        assert!(html.contains("data-key-name=\"date\""));
        assert!(html.contains("data-key-value=\"2024-06-24\""));
        assert_eq!(html.matches("<textarea").count(), 3);
        assert!(html.contains("Optics &lt;revision&gt;"));
        assert!(!html.contains("holiday-prompt"));
    }

    #[test]
    fn test_school_edit_mode_prompts_for_holiday() {
        let entry = Entry::empty(&SCHOOL, "2024-06-24");
        let html = render_day_modal(Section::School, d(2024, 6, 24), &entry, true).into_string();
        assert!(html.contains("Was today a holiday?"));

        let mut holiday = Entry::empty(&SCHOOL, "2024-06-24");
        holiday.values[0] = "__IS_HOLIDAY__".to_string();
        let html = render_day_modal(Section::School, d(2024, 6, 24), &holiday, true).into_string();
        assert!(!html.contains("Was today a holiday?"));
    }

    #[test]
    fn test_holiday_renders_banner_when_read_only() {
        let mut holiday = Entry::empty(&SCHOOL, "2024-06-24");
        holiday.values[0] = "__IS_HOLIDAY__".to_string();

        let html =
            render_day_modal(Section::School, d(2024, 6, 24), &holiday, false).into_string();
        assert!(html.contains("Today was a Holiday!"));
    }

    #[test]
    fn test_special_modal() {
        let mut entry = Entry::empty(&SPECIAL, "holiday_homework");
        entry.values[0] = "- [ ] Essay".to_string();

        let read = render_special_modal(SpecialKind::HolidayHomework, &entry, false).into_string();
        assert!(read.contains("Holiday Homework"));
        assert!(read.contains("type=\"checkbox\""));

        let edit = render_special_modal(SpecialKind::HolidayHomework, &entry, true).into_string();
        assert!(edit.contains("data-endpoint=\"/api/special\""));
        assert!(edit.contains("data-key-value=\"holiday_homework\""));
        assert!(edit.contains("- [ ] Essay</textarea>"));
    }
}
