mod end_to_end;
mod levels;
