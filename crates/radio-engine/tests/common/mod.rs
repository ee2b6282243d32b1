pub mod fake_mpv;
