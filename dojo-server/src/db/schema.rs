/// SQL schema for the Dojo database
/// Creates all tables with proper constraints, foreign keys, and indexes
pub const SCHEMA: &str = r#"
-- Users table (students, instructors, admins)
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    username TEXT UNIQUE NOT NULL,
    email TEXT UNIQUE NOT NULL,
    password_hash TEXT,
    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL,
    birthday TEXT,
    role TEXT NOT NULL DEFAULT 'STUDENT' CHECK(role IN ('STUDENT', 'INSTRUCTOR', 'ADMIN')),
    status TEXT NOT NULL DEFAULT 'PENDING' CHECK(status IN ('ACTIVE', 'INACTIVE', 'PENDING')),
    is_active INTEGER NOT NULL DEFAULT 0,
    photo TEXT NOT NULL DEFAULT 'photos/default_profile.png',
    height_cm INTEGER,
    weight_kg INTEGER,
    kimono_size TEXT,
    belt_size TEXT,
    whatsapp TEXT,
    responsible_id TEXT,
    date_joined TEXT NOT NULL,
    FOREIGN KEY (responsible_id) REFERENCES users(id) ON DELETE SET NULL
);

CREATE INDEX IF NOT EXISTS idx_users_role_status ON users(role, status);
CREATE INDEX IF NOT EXISTS idx_users_responsible ON users(responsible_id);

-- Sessions table for token authentication
CREATE TABLE IF NOT EXISTS sessions (
    token TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    created_at TEXT NOT NULL,
    expires_at TEXT NOT NULL,
    acting_user_id TEXT NULL,
    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
    FOREIGN KEY (acting_user_id) REFERENCES users(id) ON DELETE CASCADE
);
CREATE INDEX IF NOT EXISTS idx_sessions_user_id ON sessions(user_id);
CREATE INDEX IF NOT EXISTS idx_sessions_expires_at ON sessions(expires_at);

-- One-time password reset tokens
CREATE TABLE IF NOT EXISTS password_resets (
    token TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    created_at TEXT NOT NULL,
    expires_at TEXT NOT NULL,
    used INTEGER NOT NULL DEFAULT 0,
    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
);

-- Classes (training groups)
CREATE TABLE IF NOT EXISTS classes (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    instructor_id TEXT,
    active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    FOREIGN KEY (instructor_id) REFERENCES users(id) ON DELETE SET NULL
);

-- Class enrollment requests
CREATE TABLE IF NOT EXISTS enrollments (
    id TEXT PRIMARY KEY,
    class_id TEXT NOT NULL,
    student_id TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'PENDING' CHECK(status IN ('PENDING', 'APPROVED', 'REJECTED')),
    requested_at TEXT NOT NULL,
    approved_at TEXT,
    UNIQUE (class_id, student_id),
    FOREIGN KEY (class_id) REFERENCES classes(id) ON DELETE CASCADE,
    FOREIGN KEY (student_id) REFERENCES users(id) ON DELETE CASCADE
);

-- Attendance requests
CREATE TABLE IF NOT EXISTS attendance_requests (
    id TEXT PRIMARY KEY,
    student_id TEXT NOT NULL,
    class_id TEXT NOT NULL,
    attendance_date TEXT NOT NULL,
    class_type TEXT NOT NULL DEFAULT 'BOTH' CHECK(class_type IN ('GI', 'NOGI', 'BOTH')),
    reason TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'PENDING' CHECK(status IN ('PENDING', 'APPROVED', 'REJECTED', 'CANCELLED')),
    rejection_reason TEXT NOT NULL DEFAULT '',
    processed_at TEXT,
    processed_by TEXT,
    notified INTEGER NOT NULL DEFAULT 0,
    UNIQUE (student_id, class_id, attendance_date, class_type),
    FOREIGN KEY (student_id) REFERENCES users(id) ON DELETE CASCADE,
    FOREIGN KEY (class_id) REFERENCES classes(id) ON DELETE CASCADE,
    FOREIGN KEY (processed_by) REFERENCES users(id) ON DELETE SET NULL
);
CREATE INDEX IF NOT EXISTS idx_attendance_status ON attendance_requests(status);
CREATE INDEX IF NOT EXISTS idx_attendance_date ON attendance_requests(attendance_date DESC);

-- Belt graduations
CREATE TABLE IF NOT EXISTS graduations (
    id TEXT PRIMARY KEY,
    student_id TEXT NOT NULL,
    belt TEXT NOT NULL,
    degree INTEGER NOT NULL CHECK(degree BETWEEN 0 AND 6),
    graduation_date TEXT NOT NULL,
    notified INTEGER NOT NULL DEFAULT 0,
    UNIQUE (student_id, belt, degree),
    FOREIGN KEY (student_id) REFERENCES users(id) ON DELETE CASCADE
);
CREATE INDEX IF NOT EXISTS idx_graduations_student ON graduations(student_id, graduation_date DESC);

-- Requests to correct a graduation date
CREATE TABLE IF NOT EXISTS graduation_date_changes (
    id TEXT PRIMARY KEY,
    graduation_id TEXT NOT NULL,
    new_date TEXT NOT NULL,
    reason TEXT NOT NULL CHECK(length(reason) <= 50),
    status TEXT NOT NULL DEFAULT 'PENDING' CHECK(status IN ('PENDING', 'APPROVED', 'REJECTED')),
    rejection_reason TEXT,
    requested_at TEXT NOT NULL,
    processed_by TEXT,
    processed_at TEXT,
    FOREIGN KEY (graduation_id) REFERENCES graduations(id) ON DELETE CASCADE,
    FOREIGN KEY (processed_by) REFERENCES users(id) ON DELETE SET NULL
);

-- Lesson plans and their scheduled topics
CREATE TABLE IF NOT EXISTS lesson_plans (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    description TEXT NOT NULL,
    instructor_id TEXT NOT NULL,
    start_date TEXT NOT NULL,
    end_date TEXT,
    class_id TEXT,
    active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    FOREIGN KEY (instructor_id) REFERENCES users(id) ON DELETE CASCADE,
    FOREIGN KEY (class_id) REFERENCES classes(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS lesson_plan_items (
    id TEXT PRIMARY KEY,
    plan_id TEXT NOT NULL,
    topic TEXT NOT NULL,
    lesson_date TEXT NOT NULL,
    position INTEGER NOT NULL DEFAULT 1,
    FOREIGN KEY (plan_id) REFERENCES lesson_plans(id) ON DELETE CASCADE
);

-- Rankings
CREATE TABLE IF NOT EXISTS rankings (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    kind TEXT NOT NULL CHECK(kind IN ('FEWEST_ABSENCES', 'CHAMPIONSHIP', 'STANDOUT_STUDENT')),
    class_id TEXT,
    start_date TEXT NOT NULL,
    end_date TEXT,
    active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    FOREIGN KEY (class_id) REFERENCES classes(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS ranking_positions (
    ranking_id TEXT NOT NULL,
    student_id TEXT NOT NULL,
    position INTEGER NOT NULL,
    score REAL NOT NULL DEFAULT 0,
    PRIMARY KEY (ranking_id, student_id),
    FOREIGN KEY (ranking_id) REFERENCES rankings(id) ON DELETE CASCADE,
    FOREIGN KEY (student_id) REFERENCES users(id) ON DELETE CASCADE
);

-- Attendance goals
CREATE TABLE IF NOT EXISTS goals (
    id TEXT PRIMARY KEY,
    instructor_id TEXT NOT NULL,
    title TEXT NOT NULL,
    start_date TEXT NOT NULL,
    end_date TEXT NOT NULL,
    target_classes INTEGER NOT NULL,
    minimum_classes INTEGER NOT NULL,
    minimum_frequency_pct INTEGER NOT NULL,
    FOREIGN KEY (instructor_id) REFERENCES users(id) ON DELETE CASCADE
);

-- Equipment and fees
CREATE TABLE IF NOT EXISTS items (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    kind TEXT NOT NULL CHECK(kind IN ('KIMONO', 'BELT', 'RASHGUARD', 'FEE')),
    price_cents INTEGER,
    stock INTEGER
);

CREATE TABLE IF NOT EXISTS orders (
    id TEXT PRIMARY KEY,
    student_id TEXT NOT NULL,
    item_id TEXT NOT NULL,
    quantity INTEGER NOT NULL DEFAULT 1 CHECK(quantity >= 1),
    status TEXT NOT NULL DEFAULT 'PENDING',
    requested_at TEXT NOT NULL,
    approved_at TEXT,
    approved_by TEXT,
    rejection_reason TEXT,
    cancellation_reason TEXT,
    final_value_cents INTEGER,
    FOREIGN KEY (student_id) REFERENCES users(id) ON DELETE CASCADE,
    FOREIGN KEY (item_id) REFERENCES items(id) ON DELETE RESTRICT,
    FOREIGN KEY (approved_by) REFERENCES users(id) ON DELETE SET NULL
);
CREATE INDEX IF NOT EXISTS idx_orders_status ON orders(status, requested_at);

-- Audit log
CREATE TABLE IF NOT EXISTS audit_logs (
    id TEXT PRIMARY KEY,
    user_id TEXT,
    action TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'SUCCESS' CHECK(status IN ('SUCCESS', 'FAILURE')),
    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE SET NULL
);
CREATE INDEX IF NOT EXISTS idx_audit_logs_user ON audit_logs(user_id, timestamp DESC);
"#;

/// Demo data for development
/// - one admin, one instructor, three students (one a dependent)
/// - two classes, enrollments and a few attendance requests
/// - a small equipment catalogue
///
/// Passwords are filled in by `Database::seed_demo_data`.
pub const DEMO_DATA: &str = r#"
INSERT OR IGNORE INTO users (id, username, email, first_name, last_name, birthday, role, status, is_active, whatsapp, height_cm, weight_kg, kimono_size, belt_size, responsible_id, date_joined) VALUES
    ('00000000-0000-4000-8000-000000000001', 'admin@dojo.local', 'admin@dojo.local', 'Helena', 'Rocha', '1980-05-10', 'ADMIN', 'ACTIVE', 1, '(11) 90000-0001', NULL, NULL, NULL, NULL, NULL, '2024-01-01 00:00:00+00:00'),
    ('00000000-0000-4000-8000-000000000002', 'carlos@dojo.local', 'carlos@dojo.local', 'Carlos', 'Mendes', '1985-09-21', 'INSTRUCTOR', 'ACTIVE', 1, '(11) 90000-0002', NULL, NULL, NULL, NULL, NULL, '2024-01-02 00:00:00+00:00'),
    ('00000000-0000-4000-8000-000000000003', 'bruna@dojo.local', 'bruna@dojo.local', 'Bruna', 'Lima', '1998-02-14', 'STUDENT', 'ACTIVE', 1, '(11) 90000-0003', 165, 58, 'A1', 'A1', NULL, '2024-01-03 00:00:00+00:00'),
    ('00000000-0000-4000-8000-000000000004', 'diego@dojo.local', 'diego@dojo.local', 'Diego', 'Alves', '1995-07-30', 'STUDENT', 'ACTIVE', 1, '(11) 90000-0004', 180, 82, 'A3', 'A3', NULL, '2024-01-04 00:00:00+00:00'),
    ('00000000-0000-4000-8000-000000000005', 'lia@dojo.local', 'lia@dojo.local', 'Lia', 'Alves', '2015-11-02', 'STUDENT', 'PENDING', 0, '(11) 90000-0004', NULL, NULL, NULL, NULL, '00000000-0000-4000-8000-000000000004', '2024-01-05 00:00:00+00:00');

INSERT OR IGNORE INTO classes (id, name, description, instructor_id, active, created_at) VALUES
    ('10000000-0000-4000-8000-000000000001', 'Adults Fundamentals', 'Mon/Wed/Fri evening', '00000000-0000-4000-8000-000000000002', 1, '2024-01-10 00:00:00+00:00'),
    ('10000000-0000-4000-8000-000000000002', 'Kids', 'Tue/Thu afternoon', '00000000-0000-4000-8000-000000000002', 1, '2024-01-10 00:00:00+00:00');

INSERT OR IGNORE INTO enrollments (id, class_id, student_id, status, requested_at, approved_at) VALUES
    ('20000000-0000-4000-8000-000000000001', '10000000-0000-4000-8000-000000000001', '00000000-0000-4000-8000-000000000003', 'APPROVED', '2024-01-11 00:00:00+00:00', '2024-01-12 00:00:00+00:00'),
    ('20000000-0000-4000-8000-000000000002', '10000000-0000-4000-8000-000000000001', '00000000-0000-4000-8000-000000000004', 'PENDING', '2024-01-11 00:00:00+00:00', NULL);

INSERT OR IGNORE INTO graduations (id, student_id, belt, degree, graduation_date, notified) VALUES
    ('30000000-0000-4000-8000-000000000001', '00000000-0000-4000-8000-000000000003', 'BLUE', 2, '2023-12-01', 1),
    ('30000000-0000-4000-8000-000000000002', '00000000-0000-4000-8000-000000000004', 'WHITE', 3, '2023-11-15', 1);

INSERT OR IGNORE INTO attendance_requests (id, student_id, class_id, attendance_date, class_type, reason, status) VALUES
    ('40000000-0000-4000-8000-000000000001', '00000000-0000-4000-8000-000000000003', '10000000-0000-4000-8000-000000000001', '2024-02-05', 'GI', 'Forgot to check in', 'APPROVED'),
    ('40000000-0000-4000-8000-000000000002', '00000000-0000-4000-8000-000000000003', '10000000-0000-4000-8000-000000000001', '2024-02-07', 'NOGI', 'Open mat', 'PENDING');

INSERT OR IGNORE INTO items (id, name, kind, price_cents, stock) VALUES
    ('50000000-0000-4000-8000-000000000001', 'White Kimono A2', 'KIMONO', 35000, 10),
    ('50000000-0000-4000-8000-000000000002', 'Purple Belt', 'BELT', 5000, 5),
    ('50000000-0000-4000-8000-000000000003', 'Rashguard', 'RASHGUARD', 12000, 3),
    ('50000000-0000-4000-8000-000000000004', 'Monthly Fee', 'FEE', 18000, NULL);
"#;
